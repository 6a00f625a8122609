//! Single-segment name resolution.
//!
//! [`Namespace::search_and_enter`] is the primitive every lookup bottoms
//! out in: search the immediate scope, optionally walk up through the
//! ancestors, and (during table load) create the node when nothing is found.

use bitflags::bitflags;
use hadron_core::{kdebug, ktrace, kwarn};

use super::{Namespace, NodeFlags, NodeId, OwnerId};
use crate::AcpiError;
use crate::aml::path::NameSeg;
use crate::aml::value::ObjectType;

/// Phase the interpreter is in when it asks for a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterMode {
    /// First table-load pass: names are entered, never searched upward.
    LoadPass1,
    /// Second table-load pass: names may be searched upward and created.
    LoadPass2,
    /// Method execution: names are never created implicitly.
    Execute,
}

impl InterpreterMode {
    /// Returns `true` for either table-load pass.
    #[must_use]
    pub const fn is_load(self) -> bool {
        matches!(self, Self::LoadPass1 | Self::LoadPass2)
    }
}

bitflags! {
    /// Flags controlling [`Namespace::search_and_enter`] and
    /// [`Namespace::lookup`](super::Namespace::lookup).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SearchFlags: u8 {
        /// Walk up through ancestor scopes if the name is not found locally.
        const SEARCH_PARENT = 1 << 0;
        /// Fail with [`AcpiError::AlreadyExists`] if the name is found.
        const ERROR_IF_FOUND = 1 << 1;
        /// Mark a created node as temporary (method-local).
        const TEMPORARY = 1 << 2;
        /// Mark a created node as declared by `External()`.
        const EXTERNAL = 1 << 3;
        /// Reuse a found node: drop its children and object, take ownership.
        const OVERRIDE_IF_FOUND = 1 << 4;
        /// Pathname lookups never search ancestors, even for a bare name.
        const NO_UPSEARCH = 1 << 5;
        /// Return a matching alias node itself rather than its target.
        const NO_ALIAS_HOP = 1 << 6;
    }
}

impl Namespace {
    /// Searches the children of `parent` for `name`.
    ///
    /// Siblings are examined in insertion order and the first match wins.
    /// A matching alias node is followed once to its target. `object_type`
    /// is informational only; a found node is returned whatever its type.
    ///
    /// # Errors
    ///
    /// - [`AcpiError::BadParameter`] if `parent` is not a live node.
    /// - [`AcpiError::NotFound`] after the whole sibling chain was examined.
    pub fn search_one_scope(
        &self,
        name: NameSeg,
        parent: NodeId,
        object_type: ObjectType,
    ) -> Result<NodeId, AcpiError> {
        let found = self.match_in_scope(name, parent, object_type)?;
        let node = self.node(found)?;
        if !node.is_alias() {
            return Ok(found);
        }
        // Exactly one hop; a dangling alias resolves to nothing.
        match node.alias_target() {
            Some(target) if self.contains(target) => Ok(target),
            _ => Err(AcpiError::NotFound),
        }
    }

    /// Returns the first child of `parent` named `name`, alias or not.
    fn match_in_scope(
        &self,
        name: NameSeg,
        parent: NodeId,
        object_type: ObjectType,
    ) -> Result<NodeId, AcpiError> {
        let mut cursor = self.node(parent)?.child;

        while let Some(id) = cursor {
            let node = self.node(id)?;
            if node.name.as_u32() == name.as_u32() {
                ktrace!(
                    "ACPI: name [{}] ({}) found in scope [{}]",
                    name,
                    node.object_type,
                    self.node(parent)?.name
                );
                return Ok(id);
            }
            cursor = node.peer;
        }

        ktrace!(
            "ACPI: name [{}] ({}) not found in scope [{}]",
            name,
            object_type,
            self.node(parent)?.name
        );
        Err(AcpiError::NotFound)
    }

    /// Searches the ancestors of `node` for `name`, nearest scope first.
    ///
    /// Types local to a scope are never searched for upward. Each ancestor
    /// is searched with [`ObjectType::Any`].
    ///
    /// # Errors
    ///
    /// - [`AcpiError::BadParameter`] if `node` is not a live node.
    /// - [`AcpiError::NotFound`] if `node` is the root, the type is local,
    ///   or no ancestor scope holds the name.
    pub fn search_parent_tree(
        &self,
        name: NameSeg,
        node: NodeId,
        object_type: ObjectType,
    ) -> Result<NodeId, AcpiError> {
        let Some(mut scope) = self.node(node)?.parent else {
            ktrace!("ACPI: [{}] has no parent", name);
            return Err(AcpiError::NotFound);
        };

        if object_type.is_local() {
            ktrace!(
                "ACPI: [{}] type [{}] must be local to this scope (no parent search)",
                name,
                object_type
            );
            return Err(AcpiError::NotFound);
        }

        ktrace!("ACPI: searching parent [{}] for [{}]", self.node(scope)?.name, name);

        loop {
            match self.search_one_scope(name, scope, ObjectType::Any) {
                Ok(found) => return Ok(found),
                Err(AcpiError::NotFound) => {}
                Err(e) => return Err(e),
            }
            match self.node(scope)?.parent {
                Some(up) => scope = up,
                None => return Err(AcpiError::NotFound),
            }
        }
    }

    /// Finds `name` in the scope `parent`, creating it during table load.
    ///
    /// 1. An invalid name is repaired (each bad byte becomes `_`).
    /// 2. The immediate scope is searched. A hit returns the node, unless
    ///    [`SearchFlags::ERROR_IF_FOUND`] is set. With
    ///    [`SearchFlags::OVERRIDE_IF_FOUND`] the node is emptied and
    ///    re-owned first. Either flag, or [`SearchFlags::NO_ALIAS_HOP`],
    ///    acts on the matching node itself, so an alias is never followed.
    /// 3. Outside [`InterpreterMode::LoadPass1`], and with
    ///    [`SearchFlags::SEARCH_PARENT`], the ancestors are searched.
    /// 4. In [`InterpreterMode::Execute`] a miss is [`AcpiError::NotFound`].
    /// 5. Otherwise a node is created at the tail of `parent`'s children.
    ///
    /// # Errors
    ///
    /// - [`AcpiError::BadParameter`] if `parent` is not a live node.
    /// - [`AcpiError::AlreadyExists`] with `ERROR_IF_FOUND` and a hit.
    /// - [`AcpiError::NotFound`] for an execute-mode miss.
    /// - [`AcpiError::NoMemory`] if the node cannot be allocated.
    pub fn search_and_enter(
        &mut self,
        name: NameSeg,
        parent: NodeId,
        mode: InterpreterMode,
        object_type: ObjectType,
        flags: SearchFlags,
        owner: OwnerId,
    ) -> Result<NodeId, AcpiError> {
        if !self.contains(parent) {
            return Err(AcpiError::BadParameter);
        }

        let name = match name.repaired() {
            Some(fixed) => {
                if self.interpreter_slack {
                    kdebug!("ACPI: repaired invalid name [{}] to [{}]", name, fixed);
                } else {
                    kwarn!("ACPI: invalid character(s) in name [{}], repaired to [{}]", name, fixed);
                }
                fixed
            }
            None => name,
        };

        let exact = flags.intersects(
            SearchFlags::ERROR_IF_FOUND | SearchFlags::OVERRIDE_IF_FOUND | SearchFlags::NO_ALIAS_HOP,
        );
        let hit = if exact {
            self.match_in_scope(name, parent, object_type)
        } else {
            self.search_one_scope(name, parent, object_type)
        };
        match hit {
            Ok(found) => {
                if flags.contains(SearchFlags::ERROR_IF_FOUND) {
                    return Err(AcpiError::AlreadyExists);
                }
                if flags.contains(SearchFlags::OVERRIDE_IF_FOUND) {
                    self.delete_children(found)?;
                    let node = self.node_mut(found)?;
                    node.object = None;
                    node.object_type = object_type;
                    node.owner = owner;
                }
                return Ok(found);
            }
            Err(AcpiError::NotFound) => {}
            Err(e) => return Err(e),
        }

        if mode != InterpreterMode::LoadPass1 && flags.contains(SearchFlags::SEARCH_PARENT) {
            match self.search_parent_tree(name, parent, object_type) {
                Ok(found) => return Ok(found),
                Err(AcpiError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        if mode == InterpreterMode::Execute {
            return Err(AcpiError::NotFound);
        }

        let id = self.create_node(name)?;
        {
            let node = self.node_mut(id)?;
            if flags.contains(SearchFlags::TEMPORARY) {
                node.flags |= NodeFlags::TEMPORARY;
            }
            if flags.contains(SearchFlags::EXTERNAL) {
                node.flags |= NodeFlags::EXTERNAL;
            }
        }
        self.install_node(parent, id, object_type, owner)?;
        kdebug!(
            "ACPI: created [{}] ({}) in scope [{}]",
            name,
            object_type,
            self.node(parent)?.name
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aml::value::{Object, ObjectRef};
    use crate::testing::capture_log;

    fn seg(s: &str) -> NameSeg {
        NameSeg::from_str_padded(s).unwrap()
    }

    fn enter(ns: &mut Namespace, parent: NodeId, name: &str, ty: ObjectType) -> NodeId {
        ns.search_and_enter(
            seg(name),
            parent,
            InterpreterMode::LoadPass1,
            ty,
            SearchFlags::empty(),
            OwnerId(1),
        )
        .unwrap()
    }

    /// `\_SB` holding `PCI0` (device) and `_STA` (method).
    fn sb_scope() -> (Namespace, NodeId, NodeId, NodeId) {
        let mut ns = Namespace::new();
        let root = ns.root();
        let sb = enter(&mut ns, root, "_SB", ObjectType::Device);
        let pci = enter(&mut ns, sb, "PCI0", ObjectType::Device);
        let sta = enter(&mut ns, sb, "_STA", ObjectType::Method);
        (ns, sb, pci, sta)
    }

    #[test]
    fn execute_mode_finds_existing_node() {
        let (mut ns, sb, pci, _) = sb_scope();
        let found = ns
            .search_and_enter(
                seg("PCI0"),
                sb,
                InterpreterMode::Execute,
                ObjectType::Device,
                SearchFlags::empty(),
                OwnerId::NONE,
            )
            .unwrap();
        assert_eq!(found, pci);
    }

    #[test]
    fn execute_mode_never_creates() {
        let (mut ns, sb, _, _) = sb_scope();
        let before = ns.len();
        for _ in 0..3 {
            let err = ns
                .search_and_enter(
                    seg("NOPE"),
                    sb,
                    InterpreterMode::Execute,
                    ObjectType::Any,
                    SearchFlags::empty(),
                    OwnerId::NONE,
                )
                .unwrap_err();
            assert_eq!(err, AcpiError::NotFound);
        }
        assert_eq!(ns.len(), before);
    }

    #[test]
    fn load_mode_creates_at_tail() {
        let (mut ns, sb, pci, sta) = sb_scope();
        let nope = ns
            .search_and_enter(
                seg("NOPE"),
                sb,
                InterpreterMode::LoadPass2,
                ObjectType::Any,
                SearchFlags::empty(),
                OwnerId(3),
            )
            .unwrap();
        assert_eq!(ns.node(nope).unwrap().parent(), Some(sb));
        assert_eq!(ns.node(nope).unwrap().owner(), OwnerId(3));
        assert_eq!(ns.children(sb).collect::<Vec<_>>(), vec![pci, sta, nope]);
        assert_eq!(ns.search_one_scope(seg("NOPE"), sb, ObjectType::Any), Ok(nope));
    }

    #[test]
    fn repeated_execute_lookups_return_same_node() {
        let (mut ns, sb, _, sta) = sb_scope();
        for _ in 0..4 {
            let found = ns
                .search_and_enter(
                    seg("_STA"),
                    sb,
                    InterpreterMode::Execute,
                    ObjectType::Any,
                    SearchFlags::empty(),
                    OwnerId::NONE,
                )
                .unwrap();
            assert_eq!(found, sta);
        }
    }

    #[test]
    fn error_if_found() {
        let (mut ns, sb, _, _) = sb_scope();
        let err = ns
            .search_and_enter(
                seg("PCI0"),
                sb,
                InterpreterMode::LoadPass1,
                ObjectType::Device,
                SearchFlags::ERROR_IF_FOUND,
                OwnerId(1),
            )
            .unwrap_err();
        assert_eq!(err, AcpiError::AlreadyExists);
    }

    #[test]
    fn found_node_is_returned_even_if_type_differs() {
        let (mut ns, sb, pci, _) = sb_scope();
        let found = ns
            .search_and_enter(
                seg("PCI0"),
                sb,
                InterpreterMode::LoadPass1,
                ObjectType::Mutex,
                SearchFlags::empty(),
                OwnerId(1),
            )
            .unwrap();
        assert_eq!(found, pci);
        assert_eq!(ns.node_type(found), ObjectType::Device);
    }

    #[test]
    fn override_if_found_empties_and_reowns() {
        let (mut ns, sb, pci, _) = sb_scope();
        let child = enter(&mut ns, pci, "_ADR", ObjectType::Integer);
        let found = ns
            .search_and_enter(
                seg("PCI0"),
                sb,
                InterpreterMode::LoadPass1,
                ObjectType::Device,
                SearchFlags::OVERRIDE_IF_FOUND,
                OwnerId(7),
            )
            .unwrap();
        assert_eq!(found, pci);
        assert!(!ns.contains(child));
        assert_eq!(ns.node(pci).unwrap().owner(), OwnerId(7));
        assert!(ns.first_child(pci).is_none());
    }

    #[test]
    fn duplicates_resolve_to_first() {
        let mut ns = Namespace::new();
        let root = ns.root();
        let first = ns.create_node(seg("DUPE")).unwrap();
        ns.install_node(root, first, ObjectType::Integer, OwnerId::NONE)
            .unwrap();
        let second = ns.create_node(seg("DUPE")).unwrap();
        ns.install_node(root, second, ObjectType::String, OwnerId::NONE)
            .unwrap();
        assert_eq!(ns.search_one_scope(seg("DUPE"), root, ObjectType::Any), Ok(first));
    }

    #[test]
    fn parent_search_walks_up_to_root() {
        let (mut ns, _, pci, _) = sb_scope();
        let root = ns.root();
        let gpe = enter(&mut ns, root, "_GPE", ObjectType::Scope);
        let dev = enter(&mut ns, pci, "DEV0", ObjectType::Device);
        enter(&mut ns, dev, "_ADR", ObjectType::Integer);

        assert_eq!(ns.search_parent_tree(seg("_GPE"), dev, ObjectType::Any), Ok(gpe));
        // The children of `dev` are not among its ancestors' children.
        assert_eq!(
            ns.search_parent_tree(seg("_ADR"), dev, ObjectType::Any),
            Err(AcpiError::NotFound)
        );
        // A sibling is found through the parent scope.
        assert_eq!(ns.search_parent_tree(seg("DEV0"), dev, ObjectType::Any), Ok(dev));
        assert_eq!(ns.search_parent_tree(seg("PCI0"), dev, ObjectType::Any), Ok(pci));
    }

    #[test]
    fn local_types_never_search_upward() {
        let (mut ns, _, pci, _) = sb_scope();
        let root = ns.root();
        enter(&mut ns, root, "RBUF", ObjectType::Buffer);
        let dev = enter(&mut ns, pci, "DEV0", ObjectType::Device);

        for ty in [ObjectType::Resource, ObjectType::ResourceField] {
            assert_eq!(
                ns.search_parent_tree(seg("RBUF"), dev, ty),
                Err(AcpiError::NotFound)
            );
        }
        assert!(ns.search_parent_tree(seg("RBUF"), dev, ObjectType::Any).is_ok());
    }

    #[test]
    fn root_has_no_parent_to_search() {
        let ns = Namespace::new();
        assert_eq!(
            ns.search_parent_tree(seg("_SB"), ns.root(), ObjectType::Any),
            Err(AcpiError::NotFound)
        );
    }

    #[test]
    fn search_parent_flag_is_ignored_in_first_pass() {
        let (mut ns, _, pci, _) = sb_scope();
        let root = ns.root();
        let target = enter(&mut ns, root, "GLOB", ObjectType::Integer);

        let pass2 = ns
            .search_and_enter(
                seg("GLOB"),
                pci,
                InterpreterMode::Execute,
                ObjectType::Any,
                SearchFlags::SEARCH_PARENT,
                OwnerId::NONE,
            )
            .unwrap();
        assert_eq!(pass2, target);

        let pass1 = ns
            .search_and_enter(
                seg("GLOB"),
                pci,
                InterpreterMode::LoadPass1,
                ObjectType::Any,
                SearchFlags::SEARCH_PARENT,
                OwnerId::NONE,
            )
            .unwrap();
        assert_ne!(pass1, target);
        assert_eq!(ns.node(pass1).unwrap().parent(), Some(pci));
    }

    #[test]
    fn alias_is_followed_once() {
        let (mut ns, sb, pci, _) = sb_scope();
        let alias = enter(&mut ns, sb, "ALI0", ObjectType::Any);
        ns.attach_object(alias, ObjectRef::new(Object::Alias(pci)), ObjectType::Alias)
            .unwrap();
        let chained = enter(&mut ns, sb, "ALI1", ObjectType::Any);
        ns.attach_object(chained, ObjectRef::new(Object::Alias(alias)), ObjectType::Alias)
            .unwrap();

        assert_eq!(ns.search_one_scope(seg("ALI0"), sb, ObjectType::Any), Ok(pci));
        assert_eq!(ns.search_one_scope(seg("ALI1"), sb, ObjectType::Any), Ok(alias));
    }

    #[test]
    fn found_flags_act_on_the_alias_node() {
        let (mut ns, sb, pci, _) = sb_scope();
        let kid = enter(&mut ns, pci, "KID0", ObjectType::Integer);
        let alias = enter(&mut ns, sb, "ALI0", ObjectType::Any);
        ns.attach_object(alias, ObjectRef::new(Object::Alias(pci)), ObjectType::Alias)
            .unwrap();

        let err = ns
            .search_and_enter(
                seg("ALI0"),
                sb,
                InterpreterMode::LoadPass2,
                ObjectType::Integer,
                SearchFlags::ERROR_IF_FOUND,
                OwnerId(2),
            )
            .unwrap_err();
        assert_eq!(err, AcpiError::AlreadyExists);

        let found = ns
            .search_and_enter(
                seg("ALI0"),
                sb,
                InterpreterMode::LoadPass2,
                ObjectType::Integer,
                SearchFlags::OVERRIDE_IF_FOUND,
                OwnerId(2),
            )
            .unwrap();
        assert_eq!(found, alias);
        assert_eq!(ns.node_type(alias), ObjectType::Integer);
        assert_eq!(ns.node_type(pci), ObjectType::Device);
        assert!(ns.contains(kid));
    }

    #[test]
    fn invalid_name_is_repaired_before_entry() {
        let mut ns = Namespace::new();
        let root = ns.root();
        let id = ns
            .search_and_enter(
                NameSeg::new(*b"ab-1"),
                root,
                InterpreterMode::LoadPass1,
                ObjectType::Integer,
                SearchFlags::empty(),
                OwnerId(1),
            )
            .unwrap();
        assert_eq!(ns.node(id).unwrap().name(), NameSeg::new(*b"___1"));
    }

    fn enter_raw(ns: &mut Namespace, name: &[u8; 4]) -> NodeId {
        let root = ns.root();
        ns.search_and_enter(
            NameSeg::new(*name),
            root,
            InterpreterMode::LoadPass1,
            ObjectType::Integer,
            SearchFlags::empty(),
            OwnerId(1),
        )
        .unwrap()
    }

    #[test]
    fn repaired_name_warns_when_strict() {
        let log = capture_log();
        let mut ns = Namespace::new();
        enter_raw(&mut ns, b"Qz-1");
        assert!(log.contains("[WARN] ACPI: invalid character(s) in name [Qz-1], repaired to [Q__1]"));
        assert!(!log.contains("repaired invalid name [Qz-1]"));
    }

    #[test]
    fn repaired_name_is_a_debug_note_with_slack() {
        let log = capture_log();
        let mut ns = Namespace::new();
        ns.set_interpreter_slack(true);
        let id = enter_raw(&mut ns, b"Rz-1");
        assert_eq!(ns.node(id).unwrap().name(), NameSeg::new(*b"R__1"));
        assert!(log.contains("[DEBUG] ACPI: repaired invalid name [Rz-1] to [R__1]"));
        assert!(!log.contains("in name [Rz-1]"));
    }

    #[test]
    fn creation_flags_become_node_flags() {
        let mut ns = Namespace::new();
        let root = ns.root();
        let id = ns
            .search_and_enter(
                seg("TMP0"),
                root,
                InterpreterMode::LoadPass2,
                ObjectType::Integer,
                SearchFlags::TEMPORARY | SearchFlags::EXTERNAL,
                OwnerId(2),
            )
            .unwrap();
        let flags = ns.node(id).unwrap().flags();
        assert!(flags.contains(NodeFlags::TEMPORARY | NodeFlags::EXTERNAL));
    }

    #[test]
    fn stale_parent_is_bad_parameter() {
        let (mut ns, _, pci, _) = sb_scope();
        ns.remove_node(pci).unwrap();
        let err = ns
            .search_and_enter(
                seg("X"),
                pci,
                InterpreterMode::LoadPass1,
                ObjectType::Any,
                SearchFlags::empty(),
                OwnerId::NONE,
            )
            .unwrap_err();
        assert_eq!(err, AcpiError::BadParameter);
        assert_eq!(ns.search_one_scope(seg("PCI0"), pci, ObjectType::Any), Err(AcpiError::BadParameter));
    }
}
