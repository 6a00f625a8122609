//! Sleep and wake on hardware-reduced platforms, through the FADT sleep
//! control and sleep status registers.

use hadron_core::{ktrace, kwarn};

use super::sleep::{
    METHOD_BFS, METHOD_GTS, METHOD_SST, METHOD_WAK, SLEEP_TYPE_INVALID, SST_WAKING, SST_WORKING,
    STATE_S0, SleepFlags,
};
use crate::fadt::GenericAddress;
use crate::interp::AmlInterpreter;
use crate::{Acpi, AcpiError, AcpiHandler, PrepareSleep};

/// Sleep status: the system woke.
pub const SLEEP_STATUS_WAKE: u8 = 0x80;
/// Sleep control: SLP_TYPx field.
pub const SLEEP_TYPE_MASK: u8 = 0x1C;
/// Sleep control: position of the SLP_TYPx field.
pub const SLEEP_TYPE_POSITION: u8 = 2;
/// Sleep control: SLP_EN.
pub const SLEEP_ENABLE: u8 = 0x20;

fn sleep_control_value(sleep_type: u8) -> u8 {
    (sleep_type << SLEEP_TYPE_POSITION) & SLEEP_TYPE_MASK
}

fn sleep_registers<H: AcpiHandler, I: AmlInterpreter<H>>(
    acpi: &Acpi<H, I>,
) -> Option<(GenericAddress, GenericAddress)> {
    let fadt = acpi.fadt();
    (fadt.sleep_control.is_present() && fadt.sleep_status.is_present())
        .then_some((fadt.sleep_control, fadt.sleep_status))
}

/// Puts the machine into `sleep_state` through the sleep control register.
///
/// # Errors
///
/// [`AcpiError::NotExist`] if either sleep register is missing, and any
/// register access error.
pub fn enter_sleep<H: AcpiHandler, I: AmlInterpreter<H>>(
    acpi: &Acpi<H, I>,
    sleep_state: u8,
    flags: SleepFlags,
) -> Result<(), AcpiError> {
    let Some((control, status)) = sleep_registers(acpi) else {
        return Err(AcpiError::NotExist);
    };
    let hw = acpi.handler();

    hw.write_address(&status, u64::from(SLEEP_STATUS_WAKE))?;
    acpi.update_power(|p| p.system_awake = false);

    if flags.contains(SleepFlags::EXECUTE_GTS) {
        let _ = acpi.execute_sleep_method(METHOD_GTS, u64::from(sleep_state));
    }

    let value = sleep_control_value(acpi.power_state().sleep_type_a) | SLEEP_ENABLE;
    if hw.prepare_extended_sleep(sleep_state, value)? == PrepareSleep::Skip {
        ktrace!("ACPI: S{} handled by the OS", sleep_state);
        return Ok(());
    }

    hw.flush_cpu_cache();
    ktrace!("ACPI: SLEEP_CONTROL={:#x}, entering S{}", value, sleep_state);
    hw.write_address(&control, u64::from(value))?;

    while hw.read_address(&status)? & u64::from(SLEEP_STATUS_WAKE) == 0 {
        core::hint::spin_loop();
    }
    Ok(())
}

/// First half of wake: writes the S0 sleep type and optionally runs `\_BFS`.
/// A failed sleep control write is logged and skipped.
pub fn wake_prep<H: AcpiHandler, I: AmlInterpreter<H>>(
    acpi: &Acpi<H, I>,
    sleep_state: u8,
    flags: SleepFlags,
) -> Result<(), AcpiError> {
    if let Ok((type_a, _)) = acpi.get_sleep_type_data(STATE_S0) {
        let control = acpi.fadt().sleep_control;
        if control.is_present() {
            let value = sleep_control_value(type_a) | SLEEP_ENABLE;
            if let Err(e) = acpi.handler().write_address(&control, u64::from(value)) {
                kwarn!("ACPI: wake: restoring the S0 sleep type failed: {}", e);
            }
        }
    }

    if flags.contains(SleepFlags::EXECUTE_BFS) {
        let _ = acpi.execute_sleep_method(METHOD_BFS, u64::from(sleep_state));
    }
    Ok(())
}

/// Second half of wake. Always ends with the machine marked awake.
pub fn wake<H: AcpiHandler, I: AmlInterpreter<H>>(
    acpi: &Acpi<H, I>,
    sleep_state: u8,
    _flags: SleepFlags,
) -> Result<(), AcpiError> {
    acpi.update_power(|p| {
        p.sleep_type_a = SLEEP_TYPE_INVALID;
        p.sleep_type_b = SLEEP_TYPE_INVALID;
    });
    let _ = acpi.execute_sleep_method(METHOD_SST, SST_WAKING);
    let _ = acpi.execute_sleep_method(METHOD_WAK, u64::from(sleep_state));

    let status = acpi.fadt().sleep_status;
    if status.is_present() {
        if let Err(e) = acpi.handler().write_address(&status, u64::from(SLEEP_STATUS_WAKE)) {
            kwarn!("ACPI: wake: clearing sleep status failed: {}", e);
        }
    }
    acpi.update_power(|p| p.system_awake = true);

    let _ = acpi.execute_sleep_method(METHOD_SST, SST_WORKING);
    Ok(())
}
