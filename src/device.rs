//! Remote controller records
//!
//! A [`RemoteDevice`] exists from the first Connection Request of a peer until
//! its Disconnection Complete. Its connection handle is only known once the
//! link is up, and its [`DeviceType`] only once its remote name has been read.

use crate::{BluetoothAddress, constants::{ACL_HANDLE_TAG, MAX_REMOTE_NAME_LENGTH}};
use heapless::Vec;

/// ACL connection handle as used by this controller family
///
/// Built from the two handle bytes of a Connection Complete or Disconnection
/// Complete event, with [`ACL_HANDLE_TAG`] forced set in the high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AclHandle(u16);

impl AclHandle {
    /// Compose a handle from the little-endian event bytes, tagging the high byte
    #[must_use]
    pub const fn from_event_bytes(lsb: u8, msb: u8) -> Self {
        Self(u16::from_le_bytes([lsb, msb | ACL_HANDLE_TAG]))
    }

    /// Low byte of the handle
    #[must_use]
    pub const fn lsb(self) -> u8 {
        self.0.to_le_bytes()[0]
    }

    /// High byte of the handle (tag bit included)
    #[must_use]
    pub const fn msb(self) -> u8 {
        self.0.to_le_bytes()[1]
    }

    /// Raw 16-bit handle value
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Kind of PlayStation controller behind a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceType {
    /// Not (yet) recognized
    #[default]
    Unknown,
    /// `PLAYSTATION(R)3 Controller`
    Ps3DualShock,
    /// `Navigation Controller`
    Ps3Navigation,
    /// `Motion Controller`
    Ps3Motion,
    /// `Wireless Controller`
    Ps4DualShock,
}

impl DeviceType {
    /// Classify a controller from the first character of its remote name
    #[must_use]
    pub fn from_remote_name(name: &[u8]) -> Self {
        match name.first() {
            Some(b'P') => Self::Ps3DualShock,
            Some(b'N') => Self::Ps3Navigation,
            Some(b'M') => Self::Ps3Motion,
            Some(b'W') => Self::Ps4DualShock,
            _ => Self::Unknown,
        }
    }

    /// Human-readable name of the device type
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Ps3DualShock => "DualShock 3",
            Self::Ps3Navigation => "PS Move Navigation",
            Self::Ps3Motion => "PS Move Motion",
            Self::Ps4DualShock => "DualShock 4",
        }
    }
}

/// Remote name bytes, without the terminating null
pub type RemoteName = Vec<u8, MAX_REMOTE_NAME_LENGTH>;

/// A remote controller known to the connection lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDevice {
    /// Identity of the peer
    pub address: BluetoothAddress,
    connection_handle: Option<AclHandle>,
    remote_name: RemoteName,
    device_type: DeviceType,
}

impl RemoteDevice {
    /// Create a record for a peer that just asked to connect
    #[must_use]
    pub fn new(address: BluetoothAddress) -> Self {
        Self {
            address,
            connection_handle: None,
            remote_name: Vec::new(),
            device_type: DeviceType::Unknown,
        }
    }

    /// Connection handle, once Connection Complete succeeded for this peer
    #[must_use]
    pub fn connection_handle(&self) -> Option<AclHandle> {
        self.connection_handle
    }

    /// Bind the connection handle reported by Connection Complete
    pub fn set_connection_handle(&mut self, handle: AclHandle) {
        self.connection_handle = Some(handle);
    }

    /// Remote name bytes (empty until Remote Name Request Complete)
    #[must_use]
    pub fn remote_name(&self) -> &[u8] {
        &self.remote_name
    }

    /// Store the remote name, truncating at [`MAX_REMOTE_NAME_LENGTH`] bytes
    pub fn set_remote_name(&mut self, name: &[u8]) {
        let len = name.len().min(MAX_REMOTE_NAME_LENGTH);
        self.remote_name.clear();
        // Cannot fail: `len` never exceeds the capacity
        self.remote_name.extend_from_slice(&name[..len]).ok();
    }

    /// Device type (`Unknown` until classified)
    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Classify the device from its remote name
    ///
    /// Returns `None` and leaves the type untouched while the name is still empty.
    pub fn classify(&mut self) -> Option<DeviceType> {
        if self.remote_name.is_empty() {
            return None;
        }
        self.device_type = DeviceType::from_remote_name(&self.remote_name);
        Some(self.device_type)
    }
}
