//! Depth-first namespace walk.
//!
//! Callers implement [`NamespaceVisitor`] and override only the callbacks
//! they need. All methods have default bodies.

extern crate alloc;

use alloc::vec::Vec;

use super::{Namespace, NodeId};
use crate::AcpiError;
use crate::aml::value::ObjectType;

/// What the walk does after [`NamespaceVisitor::enter`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Descend into the node's children.
    Continue,
    /// Do not descend below this node.
    SkipChildren,
    /// End the walk immediately.
    Stop,
}

/// Visitor for [`Namespace::walk`].
#[allow(unused_variables)]
pub trait NamespaceVisitor {
    /// Called before the children of a matching node are visited.
    fn enter(&mut self, ns: &Namespace, node: NodeId, depth: usize) -> WalkAction {
        WalkAction::Continue
    }

    /// Called after the children of a matching node were visited.
    fn exit(&mut self, ns: &Namespace, node: NodeId, depth: usize) {}
}

impl Namespace {
    /// Walks the subtree below `start` in pre-order, children in insertion
    /// order, down to `max_depth` levels (1 = direct children only).
    ///
    /// The visitor is only called for nodes of `object_type`
    /// ([`ObjectType::Any`] matches all), but non-matching nodes are still
    /// descended into.
    ///
    /// # Errors
    ///
    /// Returns [`AcpiError::BadParameter`] if `start` is not a live node.
    pub fn walk(
        &self,
        start: NodeId,
        object_type: ObjectType,
        max_depth: usize,
        visitor: &mut impl NamespaceVisitor,
    ) -> Result<(), AcpiError> {
        enum Step {
            Enter(NodeId, usize),
            Exit(NodeId, usize),
        }

        let mut stack: Vec<Step> = Vec::new();
        let push_children = |stack: &mut Vec<Step>, parent: NodeId, depth: usize| {
            let children: Vec<NodeId> = self.children(parent).collect();
            stack.extend(children.into_iter().rev().map(|c| Step::Enter(c, depth)));
        };

        self.node(start)?;
        if max_depth > 0 {
            push_children(&mut stack, start, 1);
        }

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id, depth) => {
                    let matches = object_type == ObjectType::Any || self.node_type(id) == object_type;
                    let action = if matches {
                        visitor.enter(self, id, depth)
                    } else {
                        WalkAction::Continue
                    };
                    match action {
                        WalkAction::Stop => return Ok(()),
                        WalkAction::SkipChildren => {
                            if matches {
                                visitor.exit(self, id, depth);
                            }
                        }
                        WalkAction::Continue => {
                            if matches {
                                stack.push(Step::Exit(id, depth));
                            }
                            if depth < max_depth {
                                push_children(&mut stack, id, depth + 1);
                            }
                        }
                    }
                }
                Step::Exit(id, depth) => visitor.exit(self, id, depth),
            }
        }
        Ok(())
    }
}
