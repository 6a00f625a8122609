//! Object evaluation.
//!
//! [`Acpi::evaluate`] resolves a pathname, then either runs the node as a
//! control method or fetches its value, and finally checks the result of
//! predefined names. The interpreter lock brackets only the call into the
//! interpreter; the namespace lock is never held across it.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;
use hadron_core::{kerr, ktrace};

use crate::aml::path::AmlPath;
use crate::aml::value::{DeviceObject, NotifyHandler, Object, ObjectRef, ObjectType};
use crate::interp::{AmlInterpreter, MethodCall};
use crate::namespace::{InterpreterMode, NodeId, OwnerId, SearchFlags};
use crate::predefined;
use crate::{Acpi, AcpiError, AcpiHandler};

/// Maximum number of arguments a control method accepts (`Arg0`..`Arg6`).
pub const METHOD_MAX_ARGS: usize = 7;

bitflags! {
    /// Options for [`Acpi::evaluate`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EvalFlags: u8 {
        /// Discard whatever the evaluation returns.
        const IGNORE_RETURN_VALUE = 1 << 0;
    }
}

/// Per-call evaluation context. May be reused across calls; [`Acpi::evaluate`]
/// resets the output fields on entry.
#[derive(Debug, Default)]
pub struct EvaluateInfo {
    /// Scope the pathname is relative to; the root when `None`.
    pub prefix_node: Option<NodeId>,
    /// Pathname to resolve. `None` evaluates `prefix_node` itself.
    pub pathname: Option<String>,
    /// Arguments passed to a control method.
    pub args: Vec<Object>,
    /// Evaluation options.
    pub flags: EvalFlags,
    /// Output: the node the pathname resolved to.
    pub resolved_node: Option<NodeId>,
    /// Output: the number of arguments passed to the method.
    pub param_count: usize,
    /// Output: the returned object.
    pub return_object: Option<Object>,
}

impl EvaluateInfo {
    /// Creates a context evaluating `pathname` relative to `prefix_node`.
    #[must_use]
    pub fn new(prefix_node: Option<NodeId>, pathname: Option<&str>, args: Vec<Object>) -> Self {
        Self {
            prefix_node,
            pathname: pathname.map(String::from),
            args,
            ..Self::default()
        }
    }
}

impl<H: AcpiHandler, I: AmlInterpreter<H>> Acpi<H, I> {
    /// Evaluates the object named by `info`.
    ///
    /// Methods are executed with `info.args`; other evaluable objects yield
    /// their current value. On success the result is left in
    /// `info.return_object` unless [`EvalFlags::IGNORE_RETURN_VALUE`] is set.
    ///
    /// # Errors
    ///
    /// - Errors from name resolution ([`AcpiError::NotFound`],
    ///   [`AcpiError::BadPathname`], [`AcpiError::BadParameter`]).
    /// - [`AcpiError::NullObject`] for a method node without a method object.
    /// - [`AcpiError::Limit`] for more than [`METHOD_MAX_ARGS`] arguments.
    /// - [`AcpiError::Type`] for devices, events, mutexes, regions, thermal
    ///   zones and scopes.
    /// - Any error raised by the interpreter.
    pub fn evaluate(&self, info: &mut EvaluateInfo) -> Result<(), AcpiError> {
        info.return_object = None;
        info.param_count = 0;
        info.resolved_node = None;

        let (node, node_type, object, pathname) = {
            let mut ns = self.namespace();
            let mut node = match info.pathname.as_deref() {
                Some(text) => {
                    let path = AmlPath::parse(text)?;
                    ns.lookup(
                        info.prefix_node,
                        &path,
                        InterpreterMode::Execute,
                        ObjectType::Any,
                        SearchFlags::NO_UPSEARCH,
                        OwnerId::NONE,
                    )?
                }
                None => {
                    let node = info.prefix_node.unwrap_or(ns.root());
                    ns.node(node)?;
                    node
                }
            };

            if ns.node_type(node) == ObjectType::MethodAlias {
                node = ns.node(node)?.alias_target().ok_or(AcpiError::NullObject)?;
            }
            let node_type = ns.node_type(node);
            let object = ns.attached_object(node);
            (node, node_type, object, ns.pathname(node))
        };
        info.resolved_node = Some(node);
        ktrace!("ACPI: evaluating {} ({})", pathname, node_type);

        let predefined = if self.config().validate_predefined {
            let name = self.namespace().node(node)?.name();
            predefined::lookup(name)
        } else {
            None
        };

        let result = match node_type {
            ObjectType::Method => {
                let Some(Object::Method(method)) = object.as_deref() else {
                    kerr!("ACPI: control method {} has no attached object", pathname);
                    return Err(AcpiError::NullObject);
                };

                info.param_count = info.args.len();
                if info.param_count > METHOD_MAX_ARGS {
                    kerr!(
                        "ACPI: {}: too many arguments ({}), limit is {}",
                        pathname,
                        info.param_count,
                        METHOD_MAX_ARGS
                    );
                    return Err(AcpiError::Limit);
                }
                if let Some(p) = predefined {
                    predefined::check_argument_count(&pathname, p, info.param_count);
                }

                let call = MethodCall {
                    node,
                    method,
                    args: &info.args,
                };
                let _interp = self.interpreter_lock().lock(self.handler().thread_id());
                self.interpreter().execute_method(self, call)
            }
            ty if !ty.is_evaluable() => {
                kerr!("ACPI: {} of type [{}] cannot be evaluated", pathname, ty);
                return Err(AcpiError::Type);
            }
            _ => {
                let _interp = self.interpreter_lock().lock(self.handler().thread_id());
                self.interpreter().resolve_node_to_value(self, node).map(Some)
            }
        };

        let mut return_object = result?;
        if let Some(p) = predefined {
            predefined::check_return_value(
                &pathname,
                p,
                self.config().interpreter_slack,
                &mut return_object,
            );
        }

        if !info.flags.contains(EvalFlags::IGNORE_RETURN_VALUE) {
            info.return_object = return_object;
        }
        Ok(())
    }

    /// Evaluates `pathname` relative to `prefix` (or `prefix` itself when
    /// `pathname` is `None`) and returns the result.
    ///
    /// # Errors
    ///
    /// See [`Acpi::evaluate`].
    pub fn evaluate_object(
        &self,
        prefix: Option<NodeId>,
        pathname: Option<&str>,
        args: Vec<Object>,
    ) -> Result<Option<Object>, AcpiError> {
        let mut info = EvaluateInfo::new(prefix, pathname, args);
        self.evaluate(&mut info)?;
        Ok(info.return_object)
    }

    /// Installs a notify handler on a device, processor or thermal zone.
    ///
    /// # Errors
    ///
    /// - [`AcpiError::BadParameter`] for a stale node.
    /// - [`AcpiError::Type`] for other node types.
    /// - [`AcpiError::AlreadyExists`] if a handler is already installed.
    pub fn install_notify_handler(&self, node: NodeId, handler: NotifyHandler) -> Result<(), AcpiError> {
        let mut ns = self.namespace();
        let node_type = ns.node(node)?.object_type();
        let mut object = match (node_type, ns.attached_object(node).as_deref()) {
            (ObjectType::Device | ObjectType::Processor | ObjectType::Thermal, Some(obj)) => obj.clone(),
            (ObjectType::Device, None) => Object::Device(DeviceObject::default()),
            (ObjectType::Thermal, None) => Object::ThermalZone(DeviceObject::default()),
            _ => return Err(AcpiError::Type),
        };

        match &mut object {
            Object::Device(dev) | Object::ThermalZone(dev) => {
                if dev.notify.is_some() {
                    return Err(AcpiError::AlreadyExists);
                }
                dev.notify = Some(handler);
            }
            _ => return Err(AcpiError::Type),
        }
        ns.attach_object(node, ObjectRef::new(object), node_type)
    }

    /// Removes the notify handler installed on `node`.
    ///
    /// # Errors
    ///
    /// - [`AcpiError::BadParameter`] for a stale node.
    /// - [`AcpiError::NotExist`] if no handler is installed.
    pub fn remove_notify_handler(&self, node: NodeId) -> Result<NotifyHandler, AcpiError> {
        let mut ns = self.namespace();
        let node_type = ns.node(node)?.object_type();
        let mut object = ns
            .attached_object(node)
            .map(|obj| Object::clone(&obj))
            .ok_or(AcpiError::NotExist)?;
        let removed = match &mut object {
            Object::Device(dev) | Object::ThermalZone(dev) => dev.notify.take(),
            _ => None,
        }
        .ok_or(AcpiError::NotExist)?;
        ns.attach_object(node, ObjectRef::new(object), node_type)?;
        Ok(removed)
    }

    /// Delivers `Notify(node, value)` to the handler attached to `node`.
    ///
    /// Module-level code running in a device scope sees the device's
    /// handler through its temporary method object. Returns `false` if no
    /// handler is installed.
    ///
    /// # Errors
    ///
    /// [`AcpiError::BadParameter`] for a stale node.
    pub fn dispatch_notify(&self, node: NodeId, value: u32) -> Result<bool, AcpiError> {
        let handler = {
            let ns = self.namespace();
            ns.node(node)?;
            ns.attached_object(node).and_then(|obj| obj.notify_handler())
        };
        match handler {
            Some(h) => {
                h.call(node, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
