//! Sleep-state entry and exit.
//!
//! The public entry points follow the ACPI sequence:
//!
//! 1. [`Acpi::enter_sleep_state_prep`]: fetch `\_Sx_`, run `\_PTS`, set the
//!    system indicator.
//! 2. [`Acpi::enter_sleep_state`]: program the hardware and wait for wake.
//! 3. [`Acpi::leave_sleep_state_prep`]: restore the S0 sleep type, `\_BFS`.
//! 4. [`Acpi::leave_sleep_state`]: re-arm events, `\_WAK`, mark awake.
//!
//! Steps 2 to 4 go through a table of `{legacy, extended}` pairs. The
//! extended (hardware-reduced) function is used when the platform is
//! hardware-reduced or describes a sleep control register; otherwise the
//! legacy function is used.

extern crate alloc;

use alloc::vec;

use bitflags::bitflags;
use hadron_core::{kerr, kinfo, ktrace};

use super::{extended, legacy};
use crate::aml::value::Object;
use crate::interp::AmlInterpreter;
use crate::{Acpi, AcpiError, AcpiHandler};

/// Highest sleep state (S5, soft off).
pub const STATE_S5: u8 = 5;
/// S0, the working state.
pub const STATE_S0: u8 = 0;
/// S3, suspend to RAM.
pub const STATE_S3: u8 = 3;
/// Largest value the SLP_TYP field can hold.
pub const SLEEP_TYPE_MAX: u8 = 0x7;
/// Sleep type recorded after wake, until the next prepare.
pub const SLEEP_TYPE_INVALID: u8 = 0xFF;

/// `\_SI._SST` argument: indicator off.
pub const SST_INDICATOR_OFF: u64 = 0;
/// `\_SI._SST` argument: working.
pub const SST_WORKING: u64 = 1;
/// `\_SI._SST` argument: waking.
pub const SST_WAKING: u64 = 2;
/// `\_SI._SST` argument: sleeping.
pub const SST_SLEEPING: u64 = 3;
/// `\_SI._SST` argument: sleeping with context saved to disk.
pub const SST_SLEEP_CONTEXT: u64 = 4;

pub(crate) const METHOD_PTS: &str = "\\_PTS";
pub(crate) const METHOD_GTS: &str = "\\_GTS";
pub(crate) const METHOD_BFS: &str = "\\_BFS";
pub(crate) const METHOD_WAK: &str = "\\_WAK";
pub(crate) const METHOD_SST: &str = "\\_SI._SST";

const SLEEP_STATE_NAMES: [&str; 6] = ["\\_S0_", "\\_S1_", "\\_S2_", "\\_S3_", "\\_S4_", "\\_S5_"];

bitflags! {
    /// Optional steps of a sleep transition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SleepFlags: u8 {
        /// Run `\_GTS` before programming the sleep registers.
        const EXECUTE_GTS = 1 << 0;
        /// Run `\_BFS` while preparing to wake.
        const EXECUTE_BFS = 1 << 1;
    }
}

/// Power-management state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerState {
    /// `false` between disabling events for sleep and finishing wake.
    pub system_awake: bool,
    /// SLP_TYPa for the prepared sleep state.
    pub sleep_type_a: u8,
    /// SLP_TYPb for the prepared sleep state.
    pub sleep_type_b: u8,
}

impl PowerState {
    /// The boot state: awake, no sleep prepared.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            system_awake: true,
            sleep_type_a: SLEEP_TYPE_INVALID,
            sleep_type_b: SLEEP_TYPE_INVALID,
        }
    }
}

impl Default for PowerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Index into the sleep dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SleepFunction {
    /// Enter the sleep state.
    Enter = 0,
    /// First half of wake, interrupts still disabled.
    WakePrep = 1,
    /// Second half of wake.
    Wake = 2,
}

/// Signature shared by every sleep transition function.
pub type SleepFn<H, I> = fn(&Acpi<H, I>, u8, SleepFlags) -> Result<(), AcpiError>;

/// The two implementations of one sleep transition.
pub struct SleepFunctions<H: AcpiHandler, I: AmlInterpreter<H>> {
    /// Full fixed-hardware implementation.
    pub legacy: SleepFn<H, I>,
    /// Hardware-reduced implementation.
    pub extended: SleepFn<H, I>,
}

/// Builds the dispatch table, indexed by [`SleepFunction`].
#[must_use]
pub fn sleep_dispatch_table<H: AcpiHandler, I: AmlInterpreter<H>>() -> [SleepFunctions<H, I>; 3] {
    [
        SleepFunctions {
            legacy: legacy::enter_sleep,
            extended: extended::enter_sleep,
        },
        SleepFunctions {
            legacy: legacy::wake_prep,
            extended: extended::wake_prep,
        },
        SleepFunctions {
            legacy: legacy::wake,
            extended: extended::wake,
        },
    ]
}

impl<H: AcpiHandler, I: AmlInterpreter<H>> Acpi<H, I> {
    /// Returns `true` if sleep transitions take the hardware-reduced path.
    pub fn uses_extended_sleep(&self) -> bool {
        self.is_reduced_hardware() || self.fadt().sleep_control.is_present()
    }

    /// Runs one sleep transition through the built-in dispatch table.
    ///
    /// # Errors
    ///
    /// Whatever the selected implementation returns.
    pub fn dispatch_sleep(
        &self,
        sleep_state: u8,
        flags: SleepFlags,
        function: SleepFunction,
    ) -> Result<(), AcpiError> {
        self.dispatch_sleep_with(&sleep_dispatch_table(), sleep_state, flags, function)
    }

    /// Runs one sleep transition through `table`. Exactly one of the two
    /// functions of the entry is called.
    ///
    /// # Errors
    ///
    /// Whatever the selected implementation returns.
    pub fn dispatch_sleep_with(
        &self,
        table: &[SleepFunctions<H, I>; 3],
        sleep_state: u8,
        flags: SleepFlags,
        function: SleepFunction,
    ) -> Result<(), AcpiError> {
        let entry = &table[function as usize];
        if self.uses_extended_sleep() {
            (entry.extended)(self, sleep_state, flags)
        } else {
            (entry.legacy)(self, sleep_state, flags)
        }
    }

    /// Reads the SLP_TYPa/SLP_TYPb values for `sleep_state` from `\_Sx_`.
    ///
    /// The object is a package of either two integers, or one integer
    /// holding SLP_TYPa in bits 0..8 and SLP_TYPb in bits 8..16.
    ///
    /// # Errors
    ///
    /// - [`AcpiError::BadParameter`] for a state above S5.
    /// - [`AcpiError::NotFound`] if the platform does not support the state.
    /// - [`AcpiError::AmlNoReturnValue`], [`AcpiError::AmlOperandType`] or
    ///   [`AcpiError::AmlPackageLimit`] for a malformed object.
    pub fn get_sleep_type_data(&self, sleep_state: u8) -> Result<(u8, u8), AcpiError> {
        let name = SLEEP_STATE_NAMES
            .get(usize::from(sleep_state))
            .ok_or(AcpiError::BadParameter)?;

        let result = match self.evaluate_object(None, Some(name), vec![]) {
            Ok(Some(Object::Package(elements))) => match elements.as_slice() {
                [] => Err(AcpiError::AmlPackageLimit),
                [Object::Integer(packed)] => Ok(((*packed & 0xFF) as u8, ((*packed >> 8) & 0xFF) as u8)),
                [Object::Integer(a), Object::Integer(b), ..] => Ok(((*a & 0xFF) as u8, (*b & 0xFF) as u8)),
                _ => Err(AcpiError::AmlOperandType),
            },
            Ok(Some(_)) => Err(AcpiError::AmlOperandType),
            Ok(None) => Err(AcpiError::AmlNoReturnValue),
            Err(e) => Err(e),
        };

        match result {
            Err(AcpiError::NotFound) => ktrace!("ACPI: {} not present", name),
            Err(e) => kerr!("ACPI: while evaluating sleep state [{}]: {}", name, e),
            Ok((a, b)) => ktrace!("ACPI: {} SLP_TYPa={:#x} SLP_TYPb={:#x}", name, a, b),
        }
        result
    }

    /// Prepares to enter `sleep_state`: records its sleep type values, runs
    /// `\_PTS` and sets the system status indicator.
    ///
    /// # Errors
    ///
    /// Errors from [`Acpi::get_sleep_type_data`], or from `\_PTS` other than
    /// its absence.
    pub fn enter_sleep_state_prep(&self, sleep_state: u8) -> Result<(), AcpiError> {
        let (sleep_type_a, sleep_type_b) = self.get_sleep_type_data(sleep_state)?;
        self.update_power(|p| {
            p.sleep_type_a = sleep_type_a;
            p.sleep_type_b = sleep_type_b;
        });

        self.execute_sleep_method(METHOD_PTS, u64::from(sleep_state))?;

        let indicator = match sleep_state {
            STATE_S0 => SST_WORKING,
            1..=STATE_S3 => SST_SLEEPING,
            4 => SST_SLEEP_CONTEXT,
            _ => SST_INDICATOR_OFF,
        };
        // A missing or failing indicator method does not stop the transition.
        let _ = self.execute_sleep_method(METHOD_SST, indicator);
        Ok(())
    }

    /// Enters `sleep_state`. Returns once the platform has woken (or
    /// immediately if the OS hook asked to skip).
    ///
    /// # Errors
    ///
    /// - [`AcpiError::AmlOperandValue`] if the prepared sleep type values
    ///   are out of range (including "not prepared").
    /// - Register access errors from the selected implementation.
    pub fn enter_sleep_state(&self, sleep_state: u8, flags: SleepFlags) -> Result<(), AcpiError> {
        let power = self.power_state();
        if power.sleep_type_a > SLEEP_TYPE_MAX || power.sleep_type_b > SLEEP_TYPE_MAX {
            kerr!(
                "ACPI: sleep values out of range: A={:#x} B={:#x}",
                power.sleep_type_a,
                power.sleep_type_b
            );
            return Err(AcpiError::AmlOperandValue);
        }

        kinfo!("ACPI: entering sleep state S{}", sleep_state);
        self.dispatch_sleep(sleep_state, flags, SleepFunction::Enter)
    }

    /// First half of wake: restores the S0 sleep type and optionally runs
    /// `\_BFS`.
    ///
    /// # Errors
    ///
    /// Register access errors from the selected implementation.
    pub fn leave_sleep_state_prep(&self, sleep_state: u8, flags: SleepFlags) -> Result<(), AcpiError> {
        self.dispatch_sleep(sleep_state, flags, SleepFunction::WakePrep)
    }

    /// Second half of wake: re-arms runtime events, runs `\_WAK` and marks
    /// the system awake.
    ///
    /// # Errors
    ///
    /// Register access errors from the selected implementation.
    pub fn leave_sleep_state(&self, sleep_state: u8) -> Result<(), AcpiError> {
        self.dispatch_sleep(sleep_state, SleepFlags::empty(), SleepFunction::Wake)
    }

    /// Runs a sleep-related method with one integer argument. A missing
    /// method is not an error.
    pub(crate) fn execute_sleep_method(&self, pathname: &str, argument: u64) -> Result<(), AcpiError> {
        match self.evaluate_object(None, Some(pathname), vec![Object::Integer(argument)]) {
            Ok(_) | Err(AcpiError::NotFound) => Ok(()),
            Err(e) => {
                kerr!("ACPI: while executing method {}: {}", pathname, e);
                Err(e)
            }
        }
    }
}
