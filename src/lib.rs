#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

// Must stay first: the logging macros are textually scoped
mod fmt;

mod address;
pub mod adapter;
pub mod bring_up;
pub mod command;
pub mod constants;
pub mod device;
pub mod event;
pub mod lifecycle;
pub mod processor;
pub mod registry;
pub mod status;
pub mod transport;

use crate::constants::{
    DEFAULT_CLASS_OF_DEVICE, DEFAULT_EVENT_MASK, DEFAULT_LOCAL_NAME, DEFAULT_PAGE_TIMEOUT,
    DEFAULT_SCAN_INTERVAL, DEFAULT_SCAN_WINDOW, INTERLACED_SCAN, MIN_SUPPORTED_VERSION,
    PAGE_SCAN_ONLY, ROLE_MASTER, STANDARD_INQUIRY_MODE,
};
use crate::event::{BufferSize, LocalVersion};

pub use adapter::Adapter;
pub use address::BluetoothAddress;
pub use command::{ChannelEncoder, CommandEncoder, HciCommand, HciOpcode};
pub use device::{AclHandle, DeviceType, RemoteDevice};
pub use registry::{ChildList, DeviceRegistry, RegistryError};
pub use status::CoreVersion;
pub use transport::{InterruptPipe, ReadFailure, TransportError, UsbTransport};

/// Errors surfaced by the adapter core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WireShockError {
    /// The command queue did not accept a command
    CommandIssue(HciOpcode),
    /// The child-device registry rejected a mutation
    Registry(RegistryError),
    /// An event is shorter than its fixed layout
    Malformed {
        /// Event code
        code: u8,
        /// Transferred length
        len: usize,
        /// Minimum length of the event layout
        min: usize,
    },
    /// A control transfer failed
    Transport(TransportError),
    /// Invalid parameter provided (e.g., malformed address)
    InvalidParameter,
    /// A fixed-capacity table is full
    CapacityExceeded,
    /// The adapter state is already borrowed further up the call stack
    Busy,
}

impl From<RegistryError> for WireShockError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<TransportError> for WireShockError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

/// Options for configuring an [`Adapter`]
///
/// Version gates and the accept role drive the state machines, the remaining
/// fields are the parameters of the bring-up commands.
///
/// # Examples
///
/// ```rust
/// use wireshock::{AdapterOptions, constants};
///
/// let options = AdapterOptions {
///     // Only accept Bluetooth 2.1 + EDR controllers
///     min_hci_version: constants::DUALSHOCK_4_VERSION,
///     min_lmp_version: constants::DUALSHOCK_4_VERSION,
///     local_name: "Living Room",
///     ..AdapterOptions::default()
/// };
/// assert_eq!(options.accept_role, constants::ROLE_MASTER);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Lowest accepted HCI major version
    pub min_hci_version: u8,
    /// Lowest accepted LMP major version
    pub min_lmp_version: u8,
    /// Role requested when accepting a connection (0x00 master, 0x01 slave)
    pub accept_role: u8,
    /// Page timeout in 0.625ms slots
    pub page_timeout: u16,
    /// Page scan interval in 0.625ms slots
    pub page_scan_interval: u16,
    /// Page scan window in 0.625ms slots
    pub page_scan_window: u16,
    /// Page scan type (0x00 standard, 0x01 interlaced)
    pub page_scan_type: u8,
    /// Inquiry scan interval in 0.625ms slots
    pub inquiry_scan_interval: u16,
    /// Inquiry scan window in 0.625ms slots
    pub inquiry_scan_window: u16,
    /// Inquiry scan type (0x00 standard, 0x01 interlaced)
    pub inquiry_scan_type: u8,
    /// Inquiry result format
    pub inquiry_mode: u8,
    /// Class of Device, wire order
    pub class_of_device: [u8; 3],
    /// Local name, also advertised in the extended inquiry response
    pub local_name: &'static str,
    /// Scan enable (0x02 page scan only)
    pub scan_enable: u8,
    /// HCI event mask
    pub event_mask: u64,
    /// Simple pairing mode
    pub simple_pairing_mode: u8,
    /// Simple pairing debug mode
    pub simple_pairing_debug_mode: u8,
    /// Authentication enable
    pub authentication_enable: u8,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            min_hci_version: MIN_SUPPORTED_VERSION,
            min_lmp_version: MIN_SUPPORTED_VERSION,
            accept_role: ROLE_MASTER,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            page_scan_interval: DEFAULT_SCAN_INTERVAL,
            page_scan_window: DEFAULT_SCAN_WINDOW,
            page_scan_type: INTERLACED_SCAN,
            inquiry_scan_interval: DEFAULT_SCAN_INTERVAL,
            inquiry_scan_window: DEFAULT_SCAN_WINDOW,
            inquiry_scan_type: INTERLACED_SCAN,
            inquiry_mode: STANDARD_INQUIRY_MODE,
            class_of_device: DEFAULT_CLASS_OF_DEVICE,
            local_name: DEFAULT_LOCAL_NAME,
            scan_enable: PAGE_SCAN_ONLY,
            event_mask: DEFAULT_EVENT_MASK,
            simple_pairing_mode: 0x01,
            simple_pairing_debug_mode: 0x01,
            authentication_enable: 0x00,
        }
    }
}

/// What the adapter knows about its controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerContext {
    local_version: Option<LocalVersion>,
    buffer_size: Option<BufferSize>,
    host_address: Option<BluetoothAddress>,
    disable_ssp: bool,
    started: bool,
    initialized: bool,
}

impl ControllerContext {
    /// HCI major version, once read
    #[must_use]
    pub fn hci_version(&self) -> Option<CoreVersion> {
        self.local_version.map(|version| version.hci_version)
    }

    /// LMP major version, once read
    #[must_use]
    pub fn lmp_version(&self) -> Option<CoreVersion> {
        self.local_version.map(|version| version.lmp_version)
    }

    /// Full version record, once read
    #[must_use]
    pub fn local_version(&self) -> Option<LocalVersion> {
        self.local_version
    }

    pub(crate) fn set_local_version(&mut self, version: LocalVersion) {
        self.local_version = Some(version);
    }

    /// Controller buffer sizes, once read
    #[must_use]
    pub fn buffer_size(&self) -> Option<BufferSize> {
        self.buffer_size
    }

    pub(crate) fn set_buffer_size(&mut self, buffer_size: BufferSize) {
        self.buffer_size = Some(buffer_size);
    }

    /// Controller address, once read
    #[must_use]
    pub fn host_address(&self) -> Option<BluetoothAddress> {
        self.host_address
    }

    pub(crate) fn set_host_address(&mut self, address: BluetoothAddress) {
        self.host_address = Some(address);
    }

    /// Whether Secure Simple Pairing setup is skipped
    #[must_use]
    pub fn disable_ssp(&self) -> bool {
        self.disable_ssp
    }

    /// Skip Secure Simple Pairing setup for the rest of the adapter's lifetime
    pub(crate) fn demote_ssp(&mut self) {
        self.disable_ssp = true;
    }

    /// Whether the first controller reset completed
    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    /// Whether bring-up completed
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Full reset cycle: bring-up starts over, SSP demotion is kept
    pub(crate) fn restart(&mut self) {
        self.started = false;
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = AdapterOptions::default();
        assert_eq!(options.min_hci_version, 3);
        assert_eq!(options.min_lmp_version, 3);
        assert_eq!(options.accept_role, 0x00);
        assert_eq!(options.scan_enable, 0x02);
        assert_eq!(options.local_name, "WireShock");
    }

    #[test]
    fn test_restart_keeps_ssp_demotion() {
        let mut ctx = ControllerContext::default();
        ctx.mark_started();
        ctx.demote_ssp();
        ctx.mark_initialized();

        ctx.restart();
        assert!(!ctx.started());
        assert!(!ctx.initialized());
        assert!(ctx.disable_ssp());
    }

    #[test]
    fn test_error_conversions() {
        assert_eq!(
            WireShockError::from(RegistryError::NotFound),
            WireShockError::Registry(RegistryError::NotFound)
        );
        assert_eq!(
            WireShockError::from(TransportError::Stall),
            WireShockError::Transport(TransportError::Stall)
        );
    }
}
