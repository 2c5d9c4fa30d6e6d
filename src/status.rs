//! Bluetooth Core version numbers
//!
//! Status bytes are carried as [`bt_hci::param::Status`]. Versions stay raw
//! bytes so a controller newer than any named specification still passes the
//! minimum-version gate.

use bt_hci::param::CoreSpecificationVersion;

/// HCI or LMP major version as reported by Read Local Version Information
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoreVersion(pub u8);

impl CoreVersion {
    /// Get the raw version number
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Specification this version number stands for, if bt-hci names it
    #[must_use]
    pub fn specification(self) -> Option<CoreSpecificationVersion> {
        let version = match self.0 {
            0x01 => CoreSpecificationVersion::VERSION_1_1,
            0x02 => CoreSpecificationVersion::VERSION_1_2,
            0x03 => CoreSpecificationVersion::VERSION_2_0_EDR,
            0x04 => CoreSpecificationVersion::VERSION_2_1_EDR,
            0x05 => CoreSpecificationVersion::VERSION_3_0_HS,
            0x06 => CoreSpecificationVersion::VERSION_4_0,
            0x07 => CoreSpecificationVersion::VERSION_4_1,
            0x08 => CoreSpecificationVersion::VERSION_4_2,
            0x09 => CoreSpecificationVersion::VERSION_5_0,
            0x0A => CoreSpecificationVersion::VERSION_5_1,
            0x0B => CoreSpecificationVersion::VERSION_5_2,
            0x0C => CoreSpecificationVersion::VERSION_5_3,
            0x0D => CoreSpecificationVersion::VERSION_5_4,
            _ => return None,
        };
        Some(version)
    }
}
