//! Predefined (reserved) names: argument counts and return-value checks.
//!
//! After an evaluation the result of a predefined name is compared with
//! the types it may return. A value of the wrong type is converted when a
//! lossless conversion exists; otherwise a warning is logged. Neither path
//! changes the status of the evaluation.

extern crate alloc;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use bitflags::bitflags;
use hadron_core::{ktrace, kwarn};

use crate::aml::path::NameSeg;
use crate::aml::value::Object;

bitflags! {
    /// Types a predefined name may return.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReturnTypes: u8 {
        /// An integer.
        const INTEGER = 1 << 0;
        /// A string.
        const STRING = 1 << 1;
        /// A buffer.
        const BUFFER = 1 << 2;
        /// A package.
        const PACKAGE = 1 << 3;
        /// An object reference.
        const REFERENCE = 1 << 4;
        /// Returning nothing is allowed.
        const NONE = 1 << 5;
        /// Anything goes.
        const ALL = Self::INTEGER.bits()
            | Self::STRING.bits()
            | Self::BUFFER.bits()
            | Self::PACKAGE.bits()
            | Self::REFERENCE.bits()
            | Self::NONE.bits();
    }
}

/// One entry of the predefined-name table.
#[derive(Debug, Clone, Copy)]
pub struct PredefinedName {
    /// The reserved name.
    pub name: NameSeg,
    /// Number of arguments the name takes.
    pub arg_count: u8,
    /// Acceptable return types; empty for names that return nothing.
    pub returns: ReturnTypes,
}

const fn entry(name: &[u8; 4], arg_count: u8, returns: ReturnTypes) -> PredefinedName {
    PredefinedName {
        name: NameSeg::new(*name),
        arg_count,
        returns,
    }
}

const INT: ReturnTypes = ReturnTypes::INTEGER;
const STR: ReturnTypes = ReturnTypes::STRING;
const BUF: ReturnTypes = ReturnTypes::BUFFER;
const PKG: ReturnTypes = ReturnTypes::PACKAGE;
const NOTHING: ReturnTypes = ReturnTypes::empty();

static PREDEFINED_NAMES: &[PredefinedName] = &[
    entry(b"_ADR", 0, INT),
    entry(b"_BBN", 0, INT),
    entry(b"_BFS", 1, NOTHING),
    entry(b"_CID", 0, INT.union(STR).union(PKG)),
    entry(b"_CLS", 0, PKG),
    entry(b"_CRS", 0, BUF),
    entry(b"_DDN", 0, STR),
    entry(b"_DIS", 0, NOTHING),
    entry(b"_DSM", 4, ReturnTypes::ALL),
    entry(b"_DSW", 3, NOTHING),
    entry(b"_EJ0", 1, NOTHING),
    entry(b"_GTS", 1, NOTHING),
    entry(b"_HID", 0, INT.union(STR)),
    entry(b"_HRV", 0, INT),
    entry(b"_INI", 0, NOTHING),
    entry(b"_LID", 0, INT),
    entry(b"_MLS", 0, PKG),
    entry(b"_OSC", 4, BUF),
    entry(b"_PIC", 1, NOTHING),
    entry(b"_PRS", 0, BUF),
    entry(b"_PRT", 0, PKG),
    entry(b"_PRW", 0, PKG),
    entry(b"_PS0", 0, NOTHING),
    entry(b"_PS3", 0, NOTHING),
    entry(b"_PSC", 0, INT),
    entry(b"_PTS", 1, NOTHING),
    entry(b"_REG", 2, NOTHING),
    entry(b"_S0_", 0, PKG),
    entry(b"_S1_", 0, PKG),
    entry(b"_S2_", 0, PKG),
    entry(b"_S3_", 0, PKG),
    entry(b"_S4_", 0, PKG),
    entry(b"_S5_", 0, PKG),
    entry(b"_SEG", 0, INT),
    entry(b"_SST", 1, NOTHING),
    entry(b"_STA", 0, INT),
    entry(b"_STR", 0, BUF),
    entry(b"_SUN", 0, INT),
    entry(b"_TMP", 0, INT),
    entry(b"_UID", 0, INT.union(STR)),
    entry(b"_WAK", 1, ReturnTypes::NONE.union(INT).union(PKG)),
];

/// Looks up a reserved name.
#[must_use]
pub fn lookup(name: NameSeg) -> Option<&'static PredefinedName> {
    if name.to_bytes()[0] != b'_' {
        return None;
    }
    PREDEFINED_NAMES.iter().find(|p| p.name == name)
}

/// Warns if the caller supplied a different number of arguments than the
/// predefined name takes.
pub fn check_argument_count(pathname: &str, predefined: &PredefinedName, supplied: usize) {
    let required = usize::from(predefined.arg_count);
    if supplied < required {
        kwarn!(
            "ACPI: {}: insufficient arguments - caller passed {}, ACPI requires {}",
            pathname,
            supplied,
            required
        );
    } else if supplied > required {
        kwarn!(
            "ACPI: {}: excess arguments - caller passed {}, ACPI requires {}",
            pathname,
            supplied,
            required
        );
    }
}

/// Outcome of [`check_return_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCheck {
    /// The value was acceptable as returned.
    Valid,
    /// The value was converted in place.
    Repaired,
    /// The value has the wrong type and could not be converted.
    Mismatch,
    /// A value was expected but none was returned.
    Missing,
}

/// Checks (and, when possible, repairs) the value returned by a predefined
/// name.
///
/// With `slack` set a missing return value is accepted silently.
pub fn check_return_value(
    pathname: &str,
    predefined: &PredefinedName,
    slack: bool,
    return_object: &mut Option<Object>,
) -> ReturnCheck {
    let expected = predefined.returns;
    if expected.is_empty() || expected == ReturnTypes::ALL {
        return ReturnCheck::Valid;
    }

    let Some(object) = return_object.as_mut() else {
        if expected.contains(ReturnTypes::NONE) || slack {
            return ReturnCheck::Valid;
        }
        kwarn!("ACPI: {}: missing expected return value", pathname);
        return ReturnCheck::Missing;
    };

    let mut outcome = if expected.intersects(type_bit(object)) {
        ReturnCheck::Valid
    } else if let Some(fixed) = convert(object, expected) {
        kwarn!(
            "ACPI: {}: converted {} to expected {}",
            pathname,
            object.object_type(),
            fixed.object_type()
        );
        *object = fixed;
        ReturnCheck::Repaired
    } else {
        kwarn!(
            "ACPI: {}: return type mismatch - found {}, expected {:?}",
            pathname,
            object.object_type(),
            expected
        );
        return ReturnCheck::Mismatch;
    };

    if matches!(&predefined.name.to_bytes(), b"_HID" | b"_CID") && repair_hardware_ids(object) {
        ktrace!("ACPI: {}: repaired device id string", pathname);
        outcome = ReturnCheck::Repaired;
    }
    outcome
}

fn type_bit(object: &Object) -> ReturnTypes {
    match object {
        Object::Integer(_) => ReturnTypes::INTEGER,
        Object::String(_) => ReturnTypes::STRING,
        Object::Buffer(_) => ReturnTypes::BUFFER,
        Object::Package(_) => ReturnTypes::PACKAGE,
        Object::Reference(_) => ReturnTypes::REFERENCE,
        _ => ReturnTypes::empty(),
    }
}

/// Converts `object` to the first type in `expected` it can be converted to.
fn convert(object: &Object, expected: ReturnTypes) -> Option<Object> {
    if expected.contains(ReturnTypes::INTEGER) {
        if let Some(v) = to_integer(object) {
            return Some(Object::Integer(v));
        }
    }
    if expected.contains(ReturnTypes::STRING) {
        if let Some(s) = to_string(object) {
            return Some(Object::String(s));
        }
    }
    if expected.contains(ReturnTypes::BUFFER) {
        if let Some(b) = to_buffer(object) {
            return Some(Object::Buffer(b));
        }
    }
    if expected.contains(ReturnTypes::PACKAGE) && object.is_data() {
        return Some(Object::Package(vec![object.clone()]));
    }
    None
}

fn to_integer(object: &Object) -> Option<u64> {
    match object {
        Object::String(s) => {
            let digits = s.trim();
            let digits = digits
                .strip_prefix("0x")
                .or_else(|| digits.strip_prefix("0X"))
                .unwrap_or(digits);
            u64::from_str_radix(digits, 16).ok()
        }
        Object::Buffer(b) if !b.is_empty() && b.len() <= 8 => {
            let mut bytes = [0u8; 8];
            bytes[..b.len()].copy_from_slice(b);
            Some(u64::from_le_bytes(bytes))
        }
        _ => None,
    }
}

fn to_string(object: &Object) -> Option<String> {
    match object {
        Object::Integer(v) => Some(alloc::format!("{v:X}")),
        Object::Buffer(b) => {
            let end = b.iter().position(|&c| c == 0).unwrap_or(b.len());
            let text = &b[..end];
            text.is_ascii().then(|| text.iter().map(|&c| char::from(c)).collect())
        }
        _ => None,
    }
}

fn to_buffer(object: &Object) -> Option<Vec<u8>> {
    match object {
        Object::Integer(v) => Some(v.to_le_bytes().to_vec()),
        Object::String(s) => Some(s.as_bytes().to_vec()),
        _ => None,
    }
}

/// Upper-cases device id strings and strips a leading `*`.
fn repair_hardware_ids(object: &mut Object) -> bool {
    match object {
        Object::String(s) => {
            let fixed = s.strip_prefix('*').unwrap_or(s).to_ascii_uppercase();
            if fixed == *s {
                false
            } else {
                *s = fixed;
                true
            }
        }
        Object::Package(elements) => elements
            .iter_mut()
            .fold(false, |changed, e| repair_hardware_ids(e) | changed),
        _ => false,
    }
}
