//! Pathname resolution on top of [`Namespace::search_and_enter`].

use hadron_core::ktrace;

use super::{InterpreterMode, Namespace, NodeId, OwnerId, SearchFlags};
use crate::AcpiError;
use crate::aml::path::{AmlPath, PathPrefix};
use crate::aml::value::{Object, ObjectRef, ObjectType};

impl Namespace {
    /// Resolves `path` starting at `scope` (the root when `None`).
    ///
    /// Each segment is resolved with [`Namespace::search_and_enter`]. Only
    /// the final segment carries `object_type` and the "found" flags
    /// ([`SearchFlags::ERROR_IF_FOUND`], [`SearchFlags::OVERRIDE_IF_FOUND`],
    /// [`SearchFlags::NO_ALIAS_HOP`]);
    /// intermediate segments are untyped. Ancestor scopes are searched only
    /// for a bare single-segment name, and never with
    /// [`SearchFlags::NO_UPSEARCH`].
    ///
    /// An empty path resolves to its starting scope.
    ///
    /// # Errors
    ///
    /// - [`AcpiError::BadParameter`] if `scope` is not a live node.
    /// - [`AcpiError::NotFound`] if a `^` prefix climbs above the root, or a
    ///   segment is missing in execute mode.
    /// - Any error of [`Namespace::search_and_enter`].
    pub fn lookup(
        &mut self,
        scope: Option<NodeId>,
        path: &AmlPath,
        mode: InterpreterMode,
        object_type: ObjectType,
        flags: SearchFlags,
        owner: OwnerId,
    ) -> Result<NodeId, AcpiError> {
        let mut current = match path.prefix() {
            PathPrefix::Root => self.root,
            PathPrefix::Relative => {
                let start = scope.unwrap_or(self.root);
                self.node(start)?;
                start
            }
            PathPrefix::Parent(levels) => {
                let mut node = scope.unwrap_or(self.root);
                for _ in 0..levels {
                    node = match self.node(node)?.parent {
                        Some(parent) => parent,
                        None => {
                            ktrace!("ACPI: path [{}] has too many parent prefixes", path);
                            return Err(AcpiError::NotFound);
                        }
                    };
                }
                node
            }
        };

        let mut base = flags;
        if !path.is_single_relative_name() || flags.contains(SearchFlags::NO_UPSEARCH) {
            base.remove(SearchFlags::SEARCH_PARENT);
        }

        let segments = path.segments();
        for (i, &seg) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            let (seg_type, seg_flags) = if last {
                (object_type, base)
            } else {
                (
                    ObjectType::Any,
                    base - SearchFlags::ERROR_IF_FOUND
                        - SearchFlags::OVERRIDE_IF_FOUND
                        - SearchFlags::NO_ALIAS_HOP,
                )
            };
            current = self.search_and_enter(seg, current, mode, seg_type, seg_flags, owner)?;
        }
        Ok(current)
    }

    /// Creates (or reuses) the node at `pathname` and attaches `object`,
    /// as the table loader does for a named object.
    ///
    /// Missing intermediate scopes are created untyped. An alias to a
    /// method node is typed [`ObjectType::MethodAlias`]. Redefining an
    /// existing alias name replaces the alias, not its target.
    ///
    /// # Errors
    ///
    /// - [`AcpiError::BadPathname`] if `pathname` is malformed.
    /// - Any error of [`Namespace::lookup`].
    pub fn define(
        &mut self,
        scope: Option<NodeId>,
        pathname: &str,
        object: Object,
        owner: OwnerId,
    ) -> Result<NodeId, AcpiError> {
        let path = AmlPath::parse(pathname)?;
        let object_type = match &object {
            Object::Alias(target) if self.node_type(*target) == ObjectType::Method => {
                ObjectType::MethodAlias
            }
            other => other.object_type(),
        };
        let node = self.lookup(
            scope,
            &path,
            InterpreterMode::LoadPass1,
            object_type,
            SearchFlags::NO_ALIAS_HOP,
            owner,
        )?;
        self.attach_object(node, ObjectRef::new(object), object_type)?;
        Ok(node)
    }

    /// Resolves an ASL-style pathname such as `\_SB.PCI0._STA` without
    /// creating anything and without ancestor search.
    ///
    /// # Errors
    ///
    /// - [`AcpiError::BadPathname`] if `pathname` is malformed.
    /// - [`AcpiError::NotFound`] if any segment is missing.
    pub fn resolve(&mut self, scope: Option<NodeId>, pathname: &str) -> Result<NodeId, AcpiError> {
        let path = AmlPath::parse(pathname)?;
        self.lookup(
            scope,
            &path,
            InterpreterMode::Execute,
            ObjectType::Any,
            SearchFlags::NO_UPSEARCH,
            OwnerId::NONE,
        )
    }
}
