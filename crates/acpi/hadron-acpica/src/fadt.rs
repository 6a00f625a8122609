//! Fixed ACPI Description Table (FADT) fields used by the sleep code.
//!
//! The platform parses the table and hands over the fields the core
//! consults: the feature flags (for `HW_REDUCED_ACPI`), whether a PM1b
//! control block exists, and the ACPI 5.0 sleep control/status registers
//! of hardware-reduced platforms.

use bitflags::bitflags;

/// FADT table signature.
pub const FADT_SIGNATURE: &[u8; 4] = b"FACP";

bitflags! {
    /// FADT fixed feature flags (offset 112).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FadtFlags: u32 {
        /// WBINVD works correctly.
        const WBINVD = 1 << 0;
        /// The power button is a control method device, not a fixed event.
        const POWER_BUTTON = 1 << 4;
        /// The sleep button is a control method device, not a fixed event.
        const SLEEP_BUTTON = 1 << 5;
        /// The RTC can wake the system from S4.
        const S4_RTC_WAKE = 1 << 7;
        /// A reset register is described.
        const RESET_REGISTER = 1 << 10;
        /// The platform implements the ACPI hardware-reduced model.
        const HW_REDUCED_ACPI = 1 << 20;
        /// S0 idle is more efficient than S3.
        const LOW_POWER_S0 = 1 << 21;
    }
}

/// An ACPI Generic Address Structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenericAddress {
    /// Address space (0 = SystemMemory, 1 = SystemIO).
    pub space_id: u8,
    /// Register width in bits.
    pub bit_width: u8,
    /// Register offset in bits.
    pub bit_offset: u8,
    /// Access size (1 = byte ... 4 = qword).
    pub access_size: u8,
    /// Register address; zero means "not present".
    pub address: u64,
}

impl GenericAddress {
    /// Describes an 8-bit register in `space_id` at `address`.
    #[must_use]
    pub const fn byte(space_id: u8, address: u64) -> Self {
        Self {
            space_id,
            bit_width: 8,
            bit_offset: 0,
            access_size: 1,
            address,
        }
    }

    /// Returns `true` if the register is present.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.address != 0
    }
}

/// The FADT fields consumed by the ACPI core.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fadt {
    /// Fixed feature flags.
    pub flags: FadtFlags,
    /// I/O address of the PM1b control block; zero if the platform has only
    /// PM1a.
    pub pm1b_control_block: u64,
    /// Sleep control register (hardware-reduced platforms).
    pub sleep_control: GenericAddress,
    /// Sleep status register (hardware-reduced platforms).
    pub sleep_status: GenericAddress,
}

impl Fadt {
    /// Returns `true` if the platform is hardware-reduced.
    #[must_use]
    pub fn is_hardware_reduced(&self) -> bool {
        self.flags.contains(FadtFlags::HW_REDUCED_ACPI)
    }

    /// Returns `true` if a PM1b control block is present.
    #[must_use]
    pub fn has_pm1b_control(&self) -> bool {
        self.pm1b_control_block != 0
    }
}
