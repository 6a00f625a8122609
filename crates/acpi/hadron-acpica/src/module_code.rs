//! Module-level code: AML that a table places outside any control method.
//!
//! The loader defers each such block with [`Acpi::defer_module_code`]. Once
//! the namespace is complete, [`Acpi::execute_module_code_list`] runs every
//! block exactly once, in load order, as a temporary method attached to the
//! block's parent scope.

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;

use hadron_core::{kerr, kinfo, kwarn};

use crate::aml::value::{MethodFlags, MethodObject, Object, ObjectRef, ObjectType};
use crate::eval::EvaluateInfo;
use crate::interp::AmlInterpreter;
use crate::namespace::NodeId;
use crate::{Acpi, AcpiError, AcpiHandler};

/// One deferred block of module-level code.
#[derive(Debug)]
pub struct PendingModuleCode {
    /// Scope the code appeared in.
    pub parent: NodeId,
    /// The block, wrapped as a zero-argument method.
    pub method: MethodObject,
    next: Option<Box<PendingModuleCode>>,
}

/// FIFO of deferred blocks, linked through [`PendingModuleCode`].
#[derive(Debug, Default)]
pub struct ModuleCodeList {
    head: Option<Box<PendingModuleCode>>,
    len: usize,
}

impl ModuleCodeList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Number of pending blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Appends a block at the tail.
    pub fn push_back(&mut self, parent: NodeId, method: MethodObject) {
        let mut cursor = &mut self.head;
        while let Some(entry) = cursor {
            cursor = &mut entry.next;
        }
        *cursor = Some(Box::new(PendingModuleCode {
            parent,
            method,
            next: None,
        }));
        self.len += 1;
    }

    /// Unlinks and returns the head block. The returned entry carries no link.
    pub fn pop_front(&mut self) -> Option<PendingModuleCode> {
        let mut entry = self.head.take()?;
        self.head = entry.next.take();
        self.len -= 1;
        Some(*entry)
    }
}

impl Drop for ModuleCodeList {
    fn drop(&mut self) {
        // Unlink iteratively so a long list cannot overflow the stack.
        while self.pop_front().is_some() {}
    }
}

impl<H: AcpiHandler, I: AmlInterpreter<H>> Acpi<H, I> {
    /// Defers a block of module-level code found in scope `parent`.
    ///
    /// # Errors
    ///
    /// [`AcpiError::BadParameter`] if `parent` is not a live node.
    pub fn defer_module_code(&self, parent: NodeId, aml: impl Into<Arc<[u8]>>) -> Result<(), AcpiError> {
        self.namespace().node(parent)?;
        let mut method = MethodObject::new(aml, 0);
        method.flags |= MethodFlags::MODULE_LEVEL;
        self.module_code.lock().push_back(parent, method);
        Ok(())
    }

    /// Number of deferred blocks not yet executed.
    pub fn pending_module_code(&self) -> usize {
        self.module_code.lock().len()
    }

    /// Runs every deferred block once, in load order, and empties the list.
    ///
    /// A failing block is logged and does not stop the remaining ones.
    pub fn execute_module_code_list(&self) {
        let mut info = EvaluateInfo::default();
        let mut executed = 0u32;

        loop {
            // The list lock must not be held while the block runs.
            let Some(entry) = self.module_code.lock().pop_front() else {
                break;
            };
            self.execute_module_code(&mut info, entry);
            executed += 1;
        }

        if executed > 0 {
            kinfo!("ACPI: Executed {} blocks of module-level executable AML code", executed);
        }
    }

    /// Runs one block as a method attached to its parent, then restores the
    /// parent's own object and type.
    fn execute_module_code(&self, info: &mut EvaluateInfo, entry: PendingModuleCode) {
        let PendingModuleCode {
            parent,
            mut method,
            ..
        } = entry;

        let saved = {
            let mut ns = self.namespace();
            let Ok(node) = ns.node(parent) else {
                kwarn!("ACPI: module-level code scope vanished before execution");
                return;
            };
            let saved_type = node.object_type();
            let saved_object = node.object().cloned();

            if saved_type == ObjectType::Device {
                method.notify = saved_object.as_deref().and_then(Object::notify_handler);
            }
            if ns
                .attach_object(parent, ObjectRef::new(Object::Method(method)), ObjectType::Method)
                .is_err()
            {
                return;
            }
            (saved_type, saved_object)
        };

        info.prefix_node = Some(parent);
        info.pathname = None;
        info.args.clear();
        if let Err(e) = self.evaluate(info) {
            kerr!(
                "ACPI: module-level code in [{}] failed: {}",
                self.namespace().pathname(parent),
                e
            );
        }
        info.return_object = None;

        let (saved_type, saved_object) = saved;
        let mut ns = self.namespace();
        let restored = ns.detach_object(parent).and_then(|_| match saved_object {
            Some(object) => ns.attach_object(parent, object, saved_type),
            None => ns.set_node_type(parent, saved_type),
        });
        if restored.is_err() {
            kwarn!("ACPI: module-level code scope vanished during execution");
        }
    }
}
