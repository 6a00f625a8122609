//! AML name segments and paths.
//!
//! ACPI names are composed of 4-byte segments. A segment is stored packed
//! into a `u32` so that scope searches compare integers, not strings. Paths
//! are formed by chaining segments behind an optional root (`\`) or
//! parent (`^`) prefix, with a maximum inline capacity of 16 segments.

use core::fmt;

use crate::AcpiError;

/// Byte substituted for every invalid character when a name is repaired.
pub const NAME_REPAIR_CHAR: u8 = b'_';

/// A 4-byte AML name segment (e.g., `_SB_`, `PCI0`, `_HID`), packed
/// little-endian into a `u32`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameSeg(u32);

impl NameSeg {
    /// The name carried by the namespace root.
    pub const ROOT: Self = Self::new(*b"\\___");

    /// Creates a segment from exactly four bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// Create a `NameSeg` from the first four bytes of a slice.
    ///
    /// Returns `None` if the slice is shorter than 4 bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let seg: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self::new(seg))
    }

    /// Creates a segment from ASL-style text, padding names shorter than
    /// four characters with `_` (`"_SB"` becomes `_SB_`).
    ///
    /// Returns `None` for an empty string or one longer than four bytes.
    #[must_use]
    pub fn from_str_padded(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 {
            return None;
        }
        let mut seg = [b'_'; 4];
        seg[..bytes.len()].copy_from_slice(bytes);
        Some(Self::new(seg))
    }

    /// Creates a segment from its packed integer form.
    #[must_use]
    pub const fn from_u32(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the packed integer form used for comparisons.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the four name bytes.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Returns `true` if every byte is a legal ACPI name character.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.to_bytes()
            .iter()
            .enumerate()
            .all(|(pos, &c)| is_valid_name_char(c, pos))
    }

    /// Returns a repaired copy of this name, or `None` if it is already
    /// valid. Each offending byte is replaced with [`NAME_REPAIR_CHAR`].
    #[must_use]
    pub fn repaired(self) -> Option<Self> {
        let mut bytes = self.to_bytes();
        let mut changed = false;
        for (pos, c) in bytes.iter_mut().enumerate() {
            if !is_valid_name_char(*c, pos) {
                *c = NAME_REPAIR_CHAR;
                changed = true;
            }
        }
        changed.then(|| Self::new(bytes))
    }
}

/// `A-Z`, `0-9` and `_` anywhere; `!` only in the last position.
fn is_valid_name_char(c: u8, position: usize) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == b'_' || (c == b'!' && position == 3)
}

impl fmt::Debug for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameSeg(\"{self}\")")
    }
}

impl fmt::Display for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02X}")?;
            }
        }
        Ok(())
    }
}

/// Maximum number of segments in an inline AML path.
const MAX_PATH_DEPTH: usize = 16;

/// Where a path starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPrefix {
    /// Relative to the caller-supplied scope.
    Relative,
    /// Absolute, starting at the namespace root (`\`).
    Root,
    /// Relative to an ancestor of the scope, one level per `^`.
    Parent(u8),
}

/// A fixed-capacity AML namespace path.
///
/// Stores up to [`MAX_PATH_DEPTH`] (16) segments inline, which is sufficient
/// for all practical ACPI namespace depths.
#[derive(Clone, Copy)]
pub struct AmlPath {
    prefix: PathPrefix,
    segments: [NameSeg; MAX_PATH_DEPTH],
    len: u8,
}

impl AmlPath {
    /// The root path (`\`).
    pub const ROOT: Self = Self {
        prefix: PathPrefix::Root,
        segments: [NameSeg::new(*b"____"); MAX_PATH_DEPTH],
        len: 0,
    };

    /// Creates an empty relative path (denotes the scope itself).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prefix: PathPrefix::Relative,
            ..Self::ROOT
        }
    }

    /// Parses an ASL-style pathname such as `\_SB.PCI0._STA`, `^^_STA`
    /// or `_HID`.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::BadPathname`] for empty or over-long segments,
    /// a `\` not at the start, or more than 16 segments.
    pub fn parse(text: &str) -> Result<Self, AcpiError> {
        let mut path = Self::new();
        let mut rest = text;

        if let Some(stripped) = rest.strip_prefix('\\') {
            path.prefix = PathPrefix::Root;
            rest = stripped;
        } else {
            let carets = rest.bytes().take_while(|&b| b == b'^').count();
            if carets > 0 {
                let carets = u8::try_from(carets).map_err(|_| AcpiError::BadPathname)?;
                path.prefix = PathPrefix::Parent(carets);
                rest = &rest[usize::from(carets)..];
            }
        }

        if rest.is_empty() {
            return Ok(path);
        }

        for part in rest.split('.') {
            let seg = NameSeg::from_str_padded(part).ok_or(AcpiError::BadPathname)?;
            if part.contains(['\\', '^']) || !path.push(seg) {
                return Err(AcpiError::BadPathname);
            }
        }
        Ok(path)
    }

    /// Appends a name segment to the path.
    ///
    /// Returns `false` if the path is already at maximum capacity.
    pub fn push(&mut self, seg: NameSeg) -> bool {
        if (self.len as usize) >= MAX_PATH_DEPTH {
            return false;
        }
        self.segments[self.len as usize] = seg;
        self.len += 1;
        true
    }

    /// Removes and returns the last name segment from the path.
    pub fn pop(&mut self) -> Option<NameSeg> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.segments[self.len as usize])
    }

    /// Returns the prefix of this path.
    #[must_use]
    pub fn prefix(&self) -> PathPrefix {
        self.prefix
    }

    /// Returns the segments of this path.
    #[must_use]
    pub fn segments(&self) -> &[NameSeg] {
        &self.segments[..self.len as usize]
    }

    /// Returns the number of segments (depth) in this path.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.len as usize
    }

    /// Returns `true` for a bare single-segment name such as `_STA`, the
    /// only form that may be searched for in ancestor scopes.
    #[must_use]
    pub fn is_single_relative_name(&self) -> bool {
        self.prefix == PathPrefix::Relative && self.len == 1
    }
}

impl Default for AmlPath {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AmlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AmlPath(\"{self}\")")
    }
}

impl fmt::Display for AmlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            PathPrefix::Relative => {}
            PathPrefix::Root => f.write_str("\\")?,
            PathPrefix::Parent(n) => {
                for _ in 0..n {
                    f.write_str("^")?;
                }
            }
        }
        for (i, seg) in self.segments().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}
