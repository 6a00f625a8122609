//! The ACPI namespace tree.
//!
//! Nodes live in an arena and are addressed by generation-checked
//! [`NodeId`] handles, so a handle to a deleted node is detected instead of
//! dangling. Each node links to its parent, its first child and its next
//! peer; peer chains are kept in insertion order and are not sorted.
//!
//! Name resolution lives in [`search`] (single segments) and [`lookup`]
//! (full pathnames); [`visitor`] walks a subtree.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use bitflags::bitflags;

use crate::AcpiError;
use crate::aml::path::NameSeg;
use crate::aml::value::{DeviceObject, Object, ObjectRef, ObjectType};

pub mod lookup;
pub mod search;
pub mod visitor;

pub use search::{InterpreterMode, SearchFlags};
pub use visitor::{NamespaceVisitor, WalkAction};

/// Handle to a namespace node.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}#{})", self.index, self.generation)
    }
}

/// Identifies the table load or method invocation that created a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OwnerId(pub u16);

impl OwnerId {
    /// Nodes that belong to nobody (the root, and nodes created by the host).
    pub const NONE: Self = Self(0);
}

bitflags! {
    /// Per-node flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Created during method execution; deleted when the method exits.
        const TEMPORARY = 1 << 0;
        /// Declared by an `External()` reference rather than defined.
        const EXTERNAL = 1 << 1;
        /// Some alias node points at this node.
        const ALIAS_TARGET = 1 << 2;
    }
}

/// A single named object in the namespace.
#[derive(Debug, Clone)]
pub struct Node {
    name: NameSeg,
    object_type: ObjectType,
    object: Option<ObjectRef>,
    parent: Option<NodeId>,
    child: Option<NodeId>,
    peer: Option<NodeId>,
    flags: NodeFlags,
    owner: OwnerId,
}

impl Node {
    fn new(name: NameSeg) -> Self {
        Self {
            name,
            object_type: ObjectType::Any,
            object: None,
            parent: None,
            child: None,
            peer: None,
            flags: NodeFlags::empty(),
            owner: OwnerId::NONE,
        }
    }

    /// Local name of this node.
    #[must_use]
    pub fn name(&self) -> NameSeg {
        self.name
    }

    /// Type of this node.
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Attached object, if any.
    #[must_use]
    pub fn object(&self) -> Option<&ObjectRef> {
        self.object.as_ref()
    }

    /// Parent node; `None` only for the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Node flags.
    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Owner that created this node.
    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Returns `true` for alias nodes (either flavor).
    #[must_use]
    pub fn is_alias(&self) -> bool {
        matches!(
            self.object_type,
            ObjectType::Alias | ObjectType::MethodAlias
        )
    }

    /// Returns the alias target of an alias node.
    #[must_use]
    pub fn alias_target(&self) -> Option<NodeId> {
        match self.object.as_deref() {
            Some(Object::Alias(target)) if self.is_alias() => Some(*target),
            _ => None,
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// The namespace: an arena of [`Node`]s rooted at `\`.
pub struct Namespace {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    count: usize,
    interpreter_slack: bool,
}

impl Namespace {
    /// Creates a namespace holding only the root node.
    ///
    /// The root is typed as a Device, like the `\` object of every ACPI
    /// system.
    #[must_use]
    pub fn new() -> Self {
        let mut root = Node::new(NameSeg::ROOT);
        root.object_type = ObjectType::Device;
        root.object = Some(ObjectRef::new(Object::Device(DeviceObject::default())));
        Self {
            slots: alloc::vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            count: 1,
            interpreter_slack: false,
        }
    }

    /// Sets whether repaired names are reported as warnings (`false`) or
    /// debug notes only (`true`).
    pub fn set_interpreter_slack(&mut self, slack: bool) {
        self.interpreter_slack = slack;
    }

    /// Returns the root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the number of live nodes, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Always `false`: the root node cannot be removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns `true` if `id` refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|s| s.generation == id.generation && s.node.is_some())
    }

    /// Returns the node behind `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::BadParameter`] for a stale or foreign handle.
    pub fn node(&self, id: NodeId) -> Result<&Node, AcpiError> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
            .ok_or(AcpiError::BadParameter)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, AcpiError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
            .ok_or(AcpiError::BadParameter)
    }

    /// Returns the type of `id`, or [`ObjectType::Any`] for a bad handle.
    #[must_use]
    pub fn node_type(&self, id: NodeId) -> ObjectType {
        self.node(id).map_or(ObjectType::Any, Node::object_type)
    }

    /// Returns a shared handle to the object attached to `id`.
    #[must_use]
    pub fn attached_object(&self, id: NodeId) -> Option<ObjectRef> {
        self.node(id).ok().and_then(|n| n.object.clone())
    }

    /// Returns the first child of `parent`.
    #[must_use]
    pub fn first_child(&self, parent: NodeId) -> Option<NodeId> {
        self.node(parent).ok().and_then(|n| n.child)
    }

    /// Returns the next peer of `node`.
    #[must_use]
    pub fn next_peer(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).ok().and_then(|n| n.peer)
    }

    /// Iterates over the children of `parent` in insertion order.
    pub fn children(&self, parent: NodeId) -> Children<'_> {
        Children {
            ns: self,
            next: self.first_child(parent),
        }
    }

    /// Allocates an unlinked node.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::NoMemory`] if the arena cannot grow.
    pub(crate) fn create_node(&mut self, name: NameSeg) -> Result<NodeId, AcpiError> {
        let node = Node::new(name);
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).map_err(|_| AcpiError::NoMemory)?;
            self.slots.try_reserve(1).map_err(|_| AcpiError::NoMemory)?;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        };
        self.count += 1;
        Ok(id)
    }

    /// Links `node` as the last child of `parent` and records its type
    /// and owner.
    pub(crate) fn install_node(
        &mut self,
        parent: NodeId,
        node: NodeId,
        object_type: ObjectType,
        owner: OwnerId,
    ) -> Result<(), AcpiError> {
        let mut last = None;
        let mut cursor = self.node(parent)?.child;
        while let Some(id) = cursor {
            last = Some(id);
            cursor = self.node(id)?.peer;
        }

        {
            let n = self.node_mut(node)?;
            n.parent = Some(parent);
            n.peer = None;
            n.object_type = object_type;
            n.owner = owner;
        }
        match last {
            Some(tail) => self.node_mut(tail)?.peer = Some(node),
            None => self.node_mut(parent)?.child = Some(node),
        }
        Ok(())
    }

    /// Attaches `object` to `id` and sets the node type to `object_type`,
    /// replacing any previously attached object.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::BadParameter`] for a bad handle.
    pub fn attach_object(
        &mut self,
        id: NodeId,
        object: ObjectRef,
        object_type: ObjectType,
    ) -> Result<(), AcpiError> {
        let alias_target = match (object_type, object.as_ref()) {
            (ObjectType::Alias | ObjectType::MethodAlias, Object::Alias(target)) => Some(*target),
            _ => None,
        };
        let node = self.node_mut(id)?;
        node.object = Some(object);
        node.object_type = object_type;
        if let Some(target) = alias_target {
            if let Ok(t) = self.node_mut(target) {
                t.flags |= NodeFlags::ALIAS_TARGET;
            }
        }
        Ok(())
    }

    /// Removes and returns the object attached to `id`. The node becomes
    /// untyped.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::BadParameter`] for a bad handle.
    pub fn detach_object(&mut self, id: NodeId) -> Result<Option<ObjectRef>, AcpiError> {
        let node = self.node_mut(id)?;
        node.object_type = ObjectType::Any;
        Ok(node.object.take())
    }

    /// Sets the type of `id` without touching its attached object.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::BadParameter`] for a bad handle.
    pub fn set_node_type(&mut self, id: NodeId, object_type: ObjectType) -> Result<(), AcpiError> {
        self.node_mut(id)?.object_type = object_type;
        Ok(())
    }

    /// Deletes every descendant of `parent`, leaving `parent` itself.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::BadParameter`] for a bad handle.
    pub fn delete_children(&mut self, parent: NodeId) -> Result<(), AcpiError> {
        let first = self.node_mut(parent)?.child.take();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut cursor = first;
        while let Some(id) = cursor {
            cursor = self.node(id)?.peer;
            stack.push(id);
        }
        while let Some(id) = stack.pop() {
            let mut child = self.node(id)?.child;
            while let Some(c) = child {
                child = self.node(c)?.peer;
                stack.push(c);
            }
            self.free_node(id);
        }
        Ok(())
    }

    /// Unlinks `id` from its parent and deletes it with all descendants.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::BadParameter`] for a bad handle or the root.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), AcpiError> {
        let parent = self.node(id)?.parent.ok_or(AcpiError::BadParameter)?;
        let peer = self.node(id)?.peer;

        if self.node(parent)?.child == Some(id) {
            self.node_mut(parent)?.child = peer;
        } else {
            let mut cursor = self.node(parent)?.child;
            while let Some(prev) = cursor {
                let next = self.node(prev)?.peer;
                if next == Some(id) {
                    self.node_mut(prev)?.peer = peer;
                    break;
                }
                cursor = next;
            }
        }

        self.delete_children(id)?;
        self.free_node(id);
        Ok(())
    }

    /// Deletes every node created by `owner`, with its subtree. Returns the
    /// number of subtrees removed.
    pub fn delete_by_owner(&mut self, owner: OwnerId) -> usize {
        if owner == OwnerId::NONE {
            return 0;
        }
        let owned: Vec<NodeId> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let node = slot.node.as_ref()?;
                let index = u32::try_from(index).ok()?;
                (node.owner == owner && node.parent.is_some()).then_some(NodeId {
                    index,
                    generation: slot.generation,
                })
            })
            .collect();

        let mut removed = 0;
        for id in owned {
            // An earlier removal may already have taken this node with its parent.
            if self.contains(id) && self.remove_node(id).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    fn free_node(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                self.count -= 1;
            }
        }
    }

    /// Renders the absolute pathname of `id`, e.g. `\_SB_.PCI0._STA`.
    #[must_use]
    pub fn pathname(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Ok(node) = self.node(current) else {
                return String::from("<invalid>");
            };
            if node.parent.is_some() {
                segments.push(node.name);
            }
            cursor = node.parent;
        }

        let mut path = String::from("\\");
        for (i, seg) in segments.iter().rev().enumerate() {
            if i > 0 {
                path.push('.');
            }
            path.push_str(&alloc::format!("{seg}"));
        }
        path
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the children of one scope.
pub struct Children<'a> {
    ns: &'a Namespace,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.ns.next_peer(current);
        Some(current)
    }
}
