//! Sleep and wake on full fixed-hardware platforms (PM1 control blocks).

use hadron_core::{ktrace, kwarn};

use super::sleep::{
    METHOD_BFS, METHOD_GTS, METHOD_SST, METHOD_WAK, SLEEP_TYPE_INVALID, SST_WAKING, SST_WORKING,
    STATE_S0, STATE_S3, STATE_S5, SleepFlags,
};
use super::{BitRegister, CLEAR_STATUS, Register, RegisterAccess};
use crate::interp::AmlInterpreter;
use crate::{Acpi, AcpiError, AcpiHandler, PrepareSleep};

/// Delay before re-issuing SLP_EN for S4/S5, in microseconds.
const S4_S5_RETRY_STALL_US: u32 = 10_000_000;

/// Writes PM1a control, and PM1b control when the FADT describes one.
fn write_pm1_control<H: AcpiHandler, I: AmlInterpreter<H>>(
    acpi: &Acpi<H, I>,
    pm1a: u32,
    pm1b: u32,
) -> Result<(), AcpiError> {
    let hw = acpi.handler();
    hw.write_register(Register::Pm1aControl, pm1a)?;
    if acpi.fadt().has_pm1b_control() {
        hw.write_register(Register::Pm1bControl, pm1b)?;
    }
    Ok(())
}

/// Reads PM1 control with SLP_TYP and SLP_EN cleared, and merges in the
/// two sleep type values.
fn pm1_control_with_sleep_type(
    hw: &impl RegisterAccess,
    sleep_type_a: u8,
    sleep_type_b: u8,
) -> Result<(u32, u32), AcpiError> {
    let sleep_type = BitRegister::SLEEP_TYPE;
    let base = hw.read_register(Register::Pm1Control)?
        & !(sleep_type.mask | BitRegister::SLEEP_ENABLE.mask);
    let shifted = |value: u8| (u32::from(value) << sleep_type.position) & sleep_type.mask;
    Ok((base | shifted(sleep_type_a), base | shifted(sleep_type_b)))
}

fn best_effort(result: Result<(), AcpiError>, what: &str) {
    if let Err(e) = result {
        kwarn!("ACPI: wake: {} failed: {}", what, e);
    }
}

/// Puts the machine into `sleep_state` through PM1 control.
///
/// Any register error aborts the transition. On return the machine has
/// woken (WAK_STS set), or the OS hook took over the transition.
pub fn enter_sleep<H: AcpiHandler, I: AmlInterpreter<H>>(
    acpi: &Acpi<H, I>,
    sleep_state: u8,
    flags: SleepFlags,
) -> Result<(), AcpiError> {
    let hw = acpi.handler();

    BitRegister::WAKE_STATUS.write(hw, CLEAR_STATUS)?;
    hw.clear_acpi_status()?;

    if sleep_state != STATE_S5 {
        // Not every chipset implements PM2 control.
        match BitRegister::ARB_DISABLE.write(hw, 1) {
            Ok(()) | Err(AcpiError::BadAddress) => {}
            Err(e) => return Err(e),
        }
    }

    hw.disable_all_gpes()?;
    acpi.update_power(|p| p.system_awake = false);
    hw.enable_all_wakeup_gpes()?;

    if flags.contains(SleepFlags::EXECUTE_GTS) {
        let _ = acpi.execute_sleep_method(METHOD_GTS, u64::from(sleep_state));
    }

    let power = acpi.power_state();
    let (mut pm1a, mut pm1b) = pm1_control_with_sleep_type(hw, power.sleep_type_a, power.sleep_type_b)?;

    // SLP_TYP first, then SLP_TYP with SLP_EN in a second write.
    write_pm1_control(acpi, pm1a, pm1b)?;
    pm1a |= BitRegister::SLEEP_ENABLE.mask;
    pm1b |= BitRegister::SLEEP_ENABLE.mask;

    if hw.prepare_sleep(sleep_state, pm1a, pm1b)? == PrepareSleep::Skip {
        ktrace!("ACPI: S{} handled by the OS", sleep_state);
        return Ok(());
    }

    hw.flush_cpu_cache();
    ktrace!("ACPI: PM1a={:#x} PM1b={:#x}, entering S{}", pm1a, pm1b, sleep_state);
    write_pm1_control(acpi, pm1a, pm1b)?;

    if sleep_state > STATE_S3 {
        // Some chipsets need SLP_EN written again for S4/S5.
        hw.stall(S4_S5_RETRY_STALL_US);
        hw.write_register(Register::Pm1Control, BitRegister::SLEEP_ENABLE.mask)?;
    }

    while BitRegister::WAKE_STATUS.read(hw)? == 0 {
        core::hint::spin_loop();
    }
    Ok(())
}

/// First half of wake: puts the S0 sleep type back into PM1 control and
/// optionally runs `\_BFS`. A PM1 access failure is logged and skipped.
pub fn wake_prep<H: AcpiHandler, I: AmlInterpreter<H>>(
    acpi: &Acpi<H, I>,
    sleep_state: u8,
    flags: SleepFlags,
) -> Result<(), AcpiError> {
    if let Ok((type_a, type_b)) = acpi.get_sleep_type_data(STATE_S0) {
        best_effort(
            pm1_control_with_sleep_type(acpi.handler(), type_a, type_b)
                .and_then(|(pm1a, pm1b)| write_pm1_control(acpi, pm1a, pm1b)),
            "restoring the S0 sleep type",
        );
    }

    if flags.contains(SleepFlags::EXECUTE_BFS) {
        let _ = acpi.execute_sleep_method(METHOD_BFS, u64::from(sleep_state));
    }
    Ok(())
}

/// Second half of wake. Steps that fail are logged and skipped so the
/// machine always ends up marked awake.
pub fn wake<H: AcpiHandler, I: AmlInterpreter<H>>(
    acpi: &Acpi<H, I>,
    sleep_state: u8,
    _flags: SleepFlags,
) -> Result<(), AcpiError> {
    let hw = acpi.handler();

    acpi.update_power(|p| {
        p.sleep_type_a = SLEEP_TYPE_INVALID;
        p.sleep_type_b = SLEEP_TYPE_INVALID;
    });
    let _ = acpi.execute_sleep_method(METHOD_SST, SST_WAKING);

    best_effort(hw.disable_all_gpes(), "disabling GPEs");
    best_effort(hw.enable_all_runtime_gpes(), "enabling runtime GPEs");

    let _ = acpi.execute_sleep_method(METHOD_WAK, u64::from(sleep_state));

    best_effort(
        BitRegister::WAKE_STATUS.write(hw, CLEAR_STATUS),
        "clearing WAK_STS",
    );
    acpi.update_power(|p| p.system_awake = true);

    // The power button status bit is set by the wake itself.
    best_effort(BitRegister::POWER_BUTTON_ENABLE.write(hw, 1), "enabling the power button");
    best_effort(
        BitRegister::POWER_BUTTON_STATUS.write(hw, CLEAR_STATUS),
        "clearing PWRBTN_STS",
    );

    let _ = acpi.execute_sleep_method(METHOD_SST, SST_WORKING);
    Ok(())
}
