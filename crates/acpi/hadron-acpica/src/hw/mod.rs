//! ACPI fixed-hardware registers and the sleep/wake protocol.
//!
//! The platform implements [`RegisterAccess`] for the raw register and GPE
//! operations. This module adds the named bit fields on top of it
//! ([`BitRegister`]) and, in [`sleep`], the table that routes each sleep
//! transition to the [`legacy`] (full fixed hardware) or [`extended`]
//! (hardware-reduced) implementation.

pub mod extended;
pub mod legacy;
pub mod sleep;

pub use sleep::{PowerState, SleepFlags, SleepFunction, SleepFunctions, sleep_dispatch_table};

use crate::AcpiError;
use crate::fadt::GenericAddress;

/// A fixed ACPI register (or register pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// PM1 status; A and B combined on read.
    Pm1Status,
    /// PM1 enable; A and B combined on read.
    Pm1Enable,
    /// PM1 control; A and B combined on read, both written on write.
    Pm1Control,
    /// PM1a control only.
    Pm1aControl,
    /// PM1b control only. Never accessed when the FADT has no PM1b block.
    Pm1bControl,
    /// PM2 control (bus-master arbitration).
    Pm2Control,
}

/// Raw hardware access supplied by the platform.
pub trait RegisterAccess {
    /// Reads a fixed register.
    ///
    /// # Errors
    ///
    /// [`AcpiError::BadAddress`] if the register is not implemented.
    fn read_register(&self, register: Register) -> Result<u32, AcpiError>;

    /// Writes a fixed register. Status registers are write-one-to-clear.
    ///
    /// # Errors
    ///
    /// [`AcpiError::BadAddress`] if the register is not implemented.
    fn write_register(&self, register: Register, value: u32) -> Result<(), AcpiError>;

    /// Reads a register described by a generic address.
    ///
    /// # Errors
    ///
    /// Platform-specific access errors.
    fn read_address(&self, address: &GenericAddress) -> Result<u64, AcpiError>;

    /// Writes a register described by a generic address.
    ///
    /// # Errors
    ///
    /// Platform-specific access errors.
    fn write_address(&self, address: &GenericAddress, value: u64) -> Result<(), AcpiError>;

    /// Clears all fixed and general-purpose event status bits.
    ///
    /// # Errors
    ///
    /// Platform-specific access errors.
    fn clear_acpi_status(&self) -> Result<(), AcpiError>;

    /// Disables every GPE.
    ///
    /// # Errors
    ///
    /// Platform-specific access errors.
    fn disable_all_gpes(&self) -> Result<(), AcpiError>;

    /// Enables the GPEs marked as wake sources.
    ///
    /// # Errors
    ///
    /// Platform-specific access errors.
    fn enable_all_wakeup_gpes(&self) -> Result<(), AcpiError>;

    /// Enables the GPEs marked as runtime event sources.
    ///
    /// # Errors
    ///
    /// Platform-specific access errors.
    fn enable_all_runtime_gpes(&self) -> Result<(), AcpiError>;
}

/// A named bit field inside a fixed register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRegister {
    /// Register holding the field.
    pub parent: Register,
    /// Position of the lowest bit.
    pub position: u8,
    /// Mask of the field, already shifted.
    pub mask: u32,
}

impl BitRegister {
    /// PM1 status: the system woke (WAK_STS).
    pub const WAKE_STATUS: Self = Self::bit(Register::Pm1Status, 15);
    /// PM1 status: power button pressed (PWRBTN_STS).
    pub const POWER_BUTTON_STATUS: Self = Self::bit(Register::Pm1Status, 8);
    /// PM1 enable: power button event enable (PWRBTN_EN).
    pub const POWER_BUTTON_ENABLE: Self = Self::bit(Register::Pm1Enable, 8);
    /// PM1 control: sleep type (SLP_TYPx).
    pub const SLEEP_TYPE: Self = Self {
        parent: Register::Pm1Control,
        position: 10,
        mask: 0x1C00,
    };
    /// PM1 control: sleep enable (SLP_EN).
    pub const SLEEP_ENABLE: Self = Self::bit(Register::Pm1Control, 13);
    /// PM2 control: bus-master arbitration disable (ARB_DIS).
    pub const ARB_DISABLE: Self = Self::bit(Register::Pm2Control, 0);

    const fn bit(parent: Register, position: u8) -> Self {
        Self {
            parent,
            position,
            mask: 1 << position,
        }
    }

    /// Reads the field value (shifted down).
    ///
    /// # Errors
    ///
    /// Errors from [`RegisterAccess::read_register`].
    pub fn read(self, hw: &impl RegisterAccess) -> Result<u32, AcpiError> {
        Ok((hw.read_register(self.parent)? & self.mask) >> self.position)
    }

    /// Writes the field value.
    ///
    /// Status fields are written alone (writing a one clears only that bit);
    /// other fields are read-modify-write.
    ///
    /// # Errors
    ///
    /// Errors from the register accessors.
    pub fn write(self, hw: &impl RegisterAccess, value: u32) -> Result<(), AcpiError> {
        let field = (value << self.position) & self.mask;
        if self.parent == Register::Pm1Status {
            return hw.write_register(self.parent, field);
        }
        let current = hw.read_register(self.parent)?;
        hw.write_register(self.parent, (current & !self.mask) | field)
    }
}

/// Value written to a status bit to clear it.
pub const CLEAR_STATUS: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;

    #[test]
    fn bit_register_masks() {
        assert_eq!(BitRegister::WAKE_STATUS.mask, 0x8000);
        assert_eq!(BitRegister::SLEEP_ENABLE.mask, 0x2000);
        assert_eq!(BitRegister::SLEEP_TYPE.mask >> BitRegister::SLEEP_TYPE.position, 0x7);
    }

    #[test]
    fn control_fields_are_read_modify_write() {
        let hw = MockPlatform::new();
        hw.set_register(Register::Pm1Control, 0x0001);
        BitRegister::SLEEP_TYPE.write(&hw, 5).unwrap();
        assert_eq!(hw.register(Register::Pm1Control), 0x0001 | (5 << 10));
        assert_eq!(BitRegister::SLEEP_TYPE.read(&hw).unwrap(), 5);
    }

    #[test]
    fn status_bits_clear_only_themselves() {
        let hw = MockPlatform::new();
        hw.set_register(Register::Pm1Status, 0x8100);
        BitRegister::WAKE_STATUS.write(&hw, CLEAR_STATUS).unwrap();
        assert_eq!(hw.register(Register::Pm1Status), 0x0100);
        assert_eq!(BitRegister::POWER_BUTTON_STATUS.read(&hw).unwrap(), 1);
    }
}
