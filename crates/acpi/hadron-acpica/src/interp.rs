//! Boundary to the AML bytecode interpreter.
//!
//! The core never decodes AML itself. It resolves names, takes the
//! interpreter lock and hands the work to an [`AmlInterpreter`]. The
//! interpreter receives the whole [`Acpi`] context so that AML which calls
//! other methods can re-enter [`Acpi::evaluate`] on the same thread.

use crate::aml::value::{MethodObject, Object};
use crate::namespace::NodeId;
use crate::{Acpi, AcpiError, AcpiHandler};

/// A control method invocation.
#[derive(Debug, Clone, Copy)]
pub struct MethodCall<'a> {
    /// The method node (or, for module-level code, its parent scope).
    pub node: NodeId,
    /// The method object attached to `node`.
    pub method: &'a MethodObject,
    /// Arguments, at most [`METHOD_MAX_ARGS`](crate::METHOD_MAX_ARGS).
    pub args: &'a [Object],
}

/// Executes AML on behalf of the evaluator.
///
/// Both entry points are called with the interpreter lock held and the
/// namespace lock released.
pub trait AmlInterpreter<H: AcpiHandler>: Sized {
    /// Runs a control method and returns its result, if it produced one.
    ///
    /// # Errors
    ///
    /// Any error raised while executing the method body.
    fn execute_method(
        &self,
        acpi: &Acpi<H, Self>,
        call: MethodCall<'_>,
    ) -> Result<Option<Object>, AcpiError>;

    /// Produces the current value of a non-method node.
    ///
    /// The default returns a copy of the attached object, which is right for
    /// named data objects. Interpreters that support field units override
    /// this to perform the region access.
    ///
    /// # Errors
    ///
    /// [`AcpiError::AmlUninitialized`] if nothing is attached to `node`.
    fn resolve_node_to_value(&self, acpi: &Acpi<H, Self>, node: NodeId) -> Result<Object, AcpiError> {
        let object = acpi
            .namespace()
            .attached_object(node)
            .ok_or(AcpiError::AmlUninitialized)?;
        Ok(Object::clone(&object))
    }
}
