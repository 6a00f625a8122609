//! Runtime configuration of the ACPI core.

/// Tunables fixed at [`Acpi::new`](crate::Acpi::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcpiConfig {
    /// Tolerate common firmware mistakes quietly: repaired names become
    /// debug notes instead of warnings, and a predefined method that
    /// returns nothing is not reported.
    pub interpreter_slack: bool,
    /// Check (and where possible repair) values returned by predefined
    /// names such as `_STA` or `_HID`.
    pub validate_predefined: bool,
    /// Forces the hardware model. `None` takes it from the FADT
    /// `HW_REDUCED_ACPI` flag.
    pub reduced_hardware: Option<bool>,
}

impl Default for AcpiConfig {
    fn default() -> Self {
        Self {
            interpreter_slack: false,
            validate_predefined: true,
            reduced_hardware: None,
        }
    }
}
