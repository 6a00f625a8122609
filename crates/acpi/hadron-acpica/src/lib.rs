//! `hadron-acpica` --- ACPI namespace resolution, object evaluation and
//! sleep-state transitions.
//!
//! The crate owns the ACPI namespace tree and the logic around it: finding
//! and creating names ([`namespace`]), evaluating objects and control
//! methods ([`eval`]), running deferred module-level code
//! ([`module_code`]), checking the results of predefined names
//! ([`predefined`]) and driving the sleep/wake register protocol ([`hw`]).
//!
//! Two things are supplied by the platform: an [`AcpiHandler`] (OS services
//! plus fixed-register access) and an [`interp::AmlInterpreter`] that runs
//! AML bytecode. Table parsing is the platform's job too; the hardware
//! description is handed in as a [`fadt::Fadt`].
//!
//! # Usage
//!
//! ```ignore
//! let acpi = Acpi::new(platform, interpreter, fadt, AcpiConfig::default());
//! acpi.execute_module_code_list();
//! let sta = acpi.evaluate_object(None, Some("\\_SB.PCI0._STA"), Vec::new())?;
//! acpi.enter_sleep_state_prep(3)?;
//! acpi.enter_sleep_state(3, SleepFlags::empty())?;
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod aml;
pub mod config;
pub mod eval;
pub mod fadt;
pub mod hw;
pub mod interp;
pub mod module_code;
pub mod namespace;
pub mod predefined;

#[cfg(test)]
mod testing;

use core::fmt;

use hadron_core::sync::{ReentrantLock, SpinLock, SpinLockGuard};

pub use aml::{AmlPath, NameSeg, Object, ObjectRef, ObjectType};
pub use config::AcpiConfig;
pub use eval::{EvalFlags, EvaluateInfo, METHOD_MAX_ARGS};
pub use fadt::{Fadt, GenericAddress};
pub use hw::{PowerState, RegisterAccess, SleepFlags, SleepFunction};
pub use interp::{AmlInterpreter, MethodCall};
pub use namespace::{InterpreterMode, Namespace, NodeId, OwnerId, SearchFlags};

use module_code::ModuleCodeList;

/// Status codes returned by the namespace, evaluator and sleep code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcpiError {
    /// The name does not exist. Expected during lookups; not a failure by
    /// itself.
    NotFound,
    /// The name already exists and the caller asked for that to be an error.
    AlreadyExists,
    /// A required argument was missing or referred to a stale node.
    BadParameter,
    /// An allocation failed.
    NoMemory,
    /// A node that must carry an object has none.
    NullObject,
    /// A fixed limit was exceeded (too many method arguments).
    Limit,
    /// The object type does not support the operation.
    Type,
    /// A register address is not implemented by the hardware.
    BadAddress,
    /// A required hardware resource does not exist.
    NotExist,
    /// The hardware did not respond.
    NoHardwareResponse,
    /// An AML object had the wrong type.
    AmlOperandType,
    /// An AML object had an out-of-range value.
    AmlOperandValue,
    /// An AML package had too few elements.
    AmlPackageLimit,
    /// A method that must return a value did not.
    AmlNoReturnValue,
    /// An object was used before being initialized.
    AmlUninitialized,
    /// A pathname could not be parsed.
    BadPathname,
    /// The platform does not implement the operation.
    NotImplemented,
    /// The operation was aborted by the platform.
    Aborted,
}

impl fmt::Display for AcpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("AE_NOT_FOUND"),
            Self::AlreadyExists => f.write_str("AE_ALREADY_EXISTS"),
            Self::BadParameter => f.write_str("AE_BAD_PARAMETER"),
            Self::NoMemory => f.write_str("AE_NO_MEMORY"),
            Self::NullObject => f.write_str("AE_NULL_OBJECT"),
            Self::Limit => f.write_str("AE_LIMIT"),
            Self::Type => f.write_str("AE_TYPE"),
            Self::BadAddress => f.write_str("AE_BAD_ADDRESS"),
            Self::NotExist => f.write_str("AE_NOT_EXIST"),
            Self::NoHardwareResponse => f.write_str("AE_NO_HARDWARE_RESPONSE"),
            Self::AmlOperandType => f.write_str("AE_AML_OPERAND_TYPE"),
            Self::AmlOperandValue => f.write_str("AE_AML_OPERAND_VALUE"),
            Self::AmlPackageLimit => f.write_str("AE_AML_PACKAGE_LIMIT"),
            Self::AmlNoReturnValue => f.write_str("AE_AML_NO_RETURN_VALUE"),
            Self::AmlUninitialized => f.write_str("AE_AML_UNINITIALIZED_ELEMENT"),
            Self::BadPathname => f.write_str("AE_BAD_PATHNAME"),
            Self::NotImplemented => f.write_str("AE_NOT_IMPLEMENTED"),
            Self::Aborted => f.write_str("AE_ABORT_METHOD"),
        }
    }
}

/// Verdict of the OS hook consulted just before the platform is put to sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareSleep {
    /// Carry on and program the sleep registers.
    Proceed,
    /// The OS (or a hypervisor) performed the transition itself; return
    /// success without touching the sleep-enable bit.
    Skip,
}

/// Services the host OS provides to the ACPI core.
pub trait AcpiOs {
    /// Returns a token unique to the calling thread. Used as the owner of
    /// the re-entrant interpreter lock; `u64::MAX` is reserved.
    fn thread_id(&self) -> u64;

    /// Busy-waits for `microseconds`.
    fn stall(&self, microseconds: u32);

    /// Writes back and invalidates the CPU caches.
    fn flush_cpu_cache(&self);

    /// Called with the final PM1 control values before SLP_EN is written.
    ///
    /// # Errors
    ///
    /// Any error aborts the sleep transition with that error.
    fn prepare_sleep(
        &self,
        sleep_state: u8,
        pm1a_control: u32,
        pm1b_control: u32,
    ) -> Result<PrepareSleep, AcpiError> {
        let _ = (sleep_state, pm1a_control, pm1b_control);
        Ok(PrepareSleep::Proceed)
    }

    /// Called with the sleep-control value before it is written on
    /// hardware-reduced platforms.
    ///
    /// # Errors
    ///
    /// Any error aborts the sleep transition with that error.
    fn prepare_extended_sleep(
        &self,
        sleep_state: u8,
        sleep_control: u8,
    ) -> Result<PrepareSleep, AcpiError> {
        let _ = (sleep_state, sleep_control);
        Ok(PrepareSleep::Proceed)
    }
}

/// Everything the ACPI core needs from the platform.
pub trait AcpiHandler: AcpiOs + RegisterAccess {}

impl<T: AcpiOs + RegisterAccess> AcpiHandler for T {}

/// The ACPI core: namespace, interpreter lock, deferred module-level code
/// and power-state bookkeeping for one machine.
pub struct Acpi<H: AcpiHandler, I: AmlInterpreter<H>> {
    handler: H,
    interpreter: I,
    config: AcpiConfig,
    fadt: Fadt,
    reduced_hardware: bool,
    namespace: SpinLock<Namespace>,
    interpreter_lock: ReentrantLock,
    module_code: SpinLock<ModuleCodeList>,
    power: SpinLock<PowerState>,
}

impl<H: AcpiHandler, I: AmlInterpreter<H>> Acpi<H, I> {
    /// Creates the core with an empty namespace (only `\`).
    ///
    /// The hardware model is hardware-reduced if the configuration says so,
    /// or, without an override, if the FADT sets `HW_REDUCED_ACPI`.
    pub fn new(handler: H, interpreter: I, fadt: Fadt, config: AcpiConfig) -> Self {
        let reduced_hardware = config
            .reduced_hardware
            .unwrap_or_else(|| fadt.is_hardware_reduced());
        let mut namespace = Namespace::new();
        namespace.set_interpreter_slack(config.interpreter_slack);

        Self {
            handler,
            interpreter,
            config,
            fadt,
            reduced_hardware,
            namespace: SpinLock::new(namespace),
            interpreter_lock: ReentrantLock::new(),
            module_code: SpinLock::new(ModuleCodeList::new()),
            power: SpinLock::new(PowerState::new()),
        }
    }

    /// Returns the platform handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns the AML interpreter.
    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AcpiConfig {
        &self.config
    }

    /// Returns the hardware description.
    pub fn fadt(&self) -> &Fadt {
        &self.fadt
    }

    /// Returns `true` on hardware-reduced platforms.
    pub fn is_reduced_hardware(&self) -> bool {
        self.reduced_hardware
    }

    /// Locks the namespace.
    ///
    /// Never hold the guard across [`Acpi::evaluate`] or any other call that
    /// may enter the interpreter.
    pub fn namespace(&self) -> SpinLockGuard<'_, Namespace> {
        self.namespace.lock()
    }

    /// Returns the interpreter lock.
    pub fn interpreter_lock(&self) -> &ReentrantLock {
        &self.interpreter_lock
    }

    /// Returns a snapshot of the power-management state.
    pub fn power_state(&self) -> PowerState {
        *self.power.lock()
    }

    /// Convenience for the sleep code: updates the power state in place.
    pub(crate) fn update_power(&self, f: impl FnOnce(&mut PowerState)) {
        f(&mut self.power.lock());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPlatform, ScriptedInterpreter};

    #[test]
    fn error_display_uses_acpica_names() {
        assert_eq!(format!("{}", AcpiError::NotFound), "AE_NOT_FOUND");
        assert_eq!(format!("{}", AcpiError::Limit), "AE_LIMIT");
        assert_eq!(format!("{}", AcpiError::AmlPackageLimit), "AE_AML_PACKAGE_LIMIT");
    }

    #[test]
    fn hardware_model_follows_fadt_unless_overridden() {
        let mut fadt = Fadt::default();
        let acpi = Acpi::new(
            MockPlatform::new(),
            ScriptedInterpreter::new(),
            fadt,
            AcpiConfig::default(),
        );
        assert!(!acpi.is_reduced_hardware());

        fadt.flags |= fadt::FadtFlags::HW_REDUCED_ACPI;
        let acpi = Acpi::new(
            MockPlatform::new(),
            ScriptedInterpreter::new(),
            fadt,
            AcpiConfig::default(),
        );
        assert!(acpi.is_reduced_hardware());

        let config = AcpiConfig {
            reduced_hardware: Some(false),
            ..AcpiConfig::default()
        };
        let acpi = Acpi::new(MockPlatform::new(), ScriptedInterpreter::new(), fadt, config);
        assert!(!acpi.is_reduced_hardware());
    }

    #[test]
    fn new_core_is_awake_with_bare_namespace() {
        let acpi = Acpi::new(
            MockPlatform::new(),
            ScriptedInterpreter::new(),
            Fadt::default(),
            AcpiConfig::default(),
        );
        assert!(acpi.power_state().system_awake);
        assert_eq!(acpi.namespace().len(), 1);
        assert!(!acpi.interpreter_lock().is_locked());
        assert_eq!(acpi.pending_module_code(), 0);
    }
}
