//! HCI Event Decoder
//!
//! Decoding happens in two stages:
//!
//! 1. [`RawEvent::decode`] splits one interrupt transfer into event code,
//!    embedded command opcode, status byte and payload. A zero-length transfer
//!    is not an error; it decodes to `None`.
//! 2. [`HciEvent::parse`] turns a raw event into a typed view. Most events
//!    are parsed with `bt_hci::event::Event`; Connection Request, Role Change
//!    and Page Scan Repetition Mode Change are read field by field with
//!    [`FromHciBytes`]. A transfer too short for its event layout, or one
//!    bt-hci rejects, fails closed with [`WireShockError::Malformed`]. Event
//!    codes this core does not know decode to [`HciEvent::Unknown`], never to
//!    an error.

use crate::{
    BluetoothAddress, WireShockError,
    command::HciOpcode,
    constants::{
        BD_ADDR_LENGTH, CLASS_OF_DEVICE_LENGTH, COMMAND_COMPLETE_OPCODE_OFFSET,
        COMMAND_COMPLETE_PAYLOAD_OFFSET, COMMAND_STATUS_OPCODE_OFFSET,
        COMMAND_STATUS_STATUS_OFFSET, CONNECTION_COMPLETE_ADDR_OFFSET,
        CONNECTION_REQUEST_ADDR_OFFSET, EVENT_PARAMETERS_OFFSET, LINK_HANDLE_OFFSET,
        MAX_REMOTE_NAME_LENGTH, PAGE_SCAN_ADDR_OFFSET, PAGE_SCAN_MODE_OFFSET, REMOTE_NAME_OFFSET,
        ROLE_OFFSET, STATUS_ADDR_OFFSET,
    },
    device::AclHandle,
    status::CoreVersion,
};
use bt_hci::{
    FromHciBytes,
    cmd::{
        SyncCmd,
        info::{ReadBdAddr, ReadLocalVersionInformation},
    },
    event::Event,
    param::{BdAddr, Status},
};

/// HCI event codes recognized by this core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EventCode {
    /// Connection Complete
    ConnectionComplete = 0x03,
    /// Connection Request
    ConnectionRequest = 0x04,
    /// Disconnection Complete
    DisconnectionComplete = 0x05,
    /// Remote Name Request Complete
    RemoteNameRequestComplete = 0x07,
    /// Command Complete
    CommandComplete = 0x0E,
    /// Command Status
    CommandStatus = 0x0F,
    /// Role Change
    RoleChange = 0x12,
    /// Number Of Completed Packets
    NumberOfCompletedPackets = 0x13,
    /// PIN Code Request
    PinCodeRequest = 0x16,
    /// Link Key Request
    LinkKeyRequest = 0x17,
    /// Link Key Notification
    LinkKeyNotification = 0x18,
    /// Page Scan Repetition Mode Change
    PageScanRepetitionModeChange = 0x20,
    /// IO Capability Request
    IoCapabilityRequest = 0x31,
    /// User Confirmation Request
    UserConfirmationRequest = 0x33,
}

impl EventCode {
    /// Convert from the raw event code byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x03 => Some(Self::ConnectionComplete),
            0x04 => Some(Self::ConnectionRequest),
            0x05 => Some(Self::DisconnectionComplete),
            0x07 => Some(Self::RemoteNameRequestComplete),
            0x0E => Some(Self::CommandComplete),
            0x0F => Some(Self::CommandStatus),
            0x12 => Some(Self::RoleChange),
            0x13 => Some(Self::NumberOfCompletedPackets),
            0x16 => Some(Self::PinCodeRequest),
            0x17 => Some(Self::LinkKeyRequest),
            0x18 => Some(Self::LinkKeyNotification),
            0x20 => Some(Self::PageScanRepetitionModeChange),
            0x31 => Some(Self::IoCapabilityRequest),
            0x33 => Some(Self::UserConfirmationRequest),
            _ => None,
        }
    }

    /// Smallest transfer length that holds every field this core reads
    const fn min_length(self) -> usize {
        match self {
            // status, handle, address
            Self::ConnectionComplete => CONNECTION_COMPLETE_ADDR_OFFSET + BD_ADDR_LENGTH,
            // address, class of device, link type
            Self::ConnectionRequest => {
                CONNECTION_REQUEST_ADDR_OFFSET + BD_ADDR_LENGTH + CLASS_OF_DEVICE_LENGTH + 1
            }
            // status, handle, reason
            Self::DisconnectionComplete => LINK_HANDLE_OFFSET + 3,
            // status, address, name
            Self::RemoteNameRequestComplete => REMOTE_NAME_OFFSET + MAX_REMOTE_NAME_LENGTH,
            // packets, opcode, status
            Self::CommandComplete => COMMAND_COMPLETE_PAYLOAD_OFFSET + 1,
            // status, packets, opcode
            Self::CommandStatus => COMMAND_STATUS_OPCODE_OFFSET + 2,
            // status, address, role
            Self::RoleChange => ROLE_OFFSET + 1,
            // address, mode
            Self::PageScanRepetitionModeChange => PAGE_SCAN_MODE_OFFSET + 1,
            // address
            Self::PinCodeRequest
            | Self::LinkKeyRequest
            | Self::LinkKeyNotification
            | Self::IoCapabilityRequest
            | Self::UserConfirmationRequest => EVENT_PARAMETERS_OFFSET + BD_ADDR_LENGTH,
            Self::NumberOfCompletedPackets => EVENT_PARAMETERS_OFFSET,
        }
    }
}

/// One interrupt transfer split into its generic parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent<'a> {
    /// Event code (byte 0)
    pub code: u8,
    /// Embedded command opcode (Command Complete / Command Status only)
    pub opcode: Option<u16>,
    /// Status byte (Command Complete / Command Status only)
    pub status: Option<u8>,
    /// Event-specific payload
    ///
    /// Return parameters (status first) for Command Complete, the event
    /// parameters for everything else.
    pub payload: &'a [u8],
    buffer: &'a [u8],
}

impl<'a> RawEvent<'a> {
    /// Decode one received transfer
    ///
    /// Returns `None` for a zero-length transfer.
    #[must_use]
    pub fn decode(buffer: &'a [u8]) -> Option<Self> {
        let code = *buffer.first()?;

        let (opcode, status, payload_offset) = match EventCode::from_u8(code) {
            Some(EventCode::CommandComplete) => (
                read_u16(buffer, COMMAND_COMPLETE_OPCODE_OFFSET),
                buffer.get(COMMAND_COMPLETE_PAYLOAD_OFFSET).copied(),
                COMMAND_COMPLETE_PAYLOAD_OFFSET,
            ),
            Some(EventCode::CommandStatus) => (
                read_u16(buffer, COMMAND_STATUS_OPCODE_OFFSET),
                buffer.get(COMMAND_STATUS_STATUS_OFFSET).copied(),
                EVENT_PARAMETERS_OFFSET,
            ),
            _ => (None, None, EVENT_PARAMETERS_OFFSET),
        };

        Some(Self {
            code,
            opcode,
            status,
            payload: buffer.get(payload_offset..).unwrap_or(&[]),
            buffer,
        })
    }

    /// Length of the whole transfer
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the transfer is empty (never true for a decoded event)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn byte(&self, offset: usize) -> u8 {
        self.buffer.get(offset).copied().unwrap_or_default()
    }

    /// Event parameters as announced by the parameter length byte
    fn parameters(&self) -> &'a [u8] {
        let end = EVENT_PARAMETERS_OFFSET + usize::from(self.byte(1));
        self.buffer
            .get(EVENT_PARAMETERS_OFFSET..end)
            .unwrap_or_default()
    }

    fn address(&self, offset: usize) -> Result<BluetoothAddress, WireShockError> {
        let field = self.buffer.get(offset..).unwrap_or_default();
        let (bd_addr, _) =
            BdAddr::from_hci_bytes(field).map_err(|_| self.malformed(offset + BD_ADDR_LENGTH))?;
        BluetoothAddress::try_from(bd_addr).map_err(|_| self.malformed(offset + BD_ADDR_LENGTH))
    }

    fn status(&self, offset: usize) -> Result<Status, WireShockError> {
        let field = self.buffer.get(offset..).unwrap_or_default();
        let (status, _) = Status::from_hci_bytes(field).map_err(|_| self.malformed(offset + 1))?;
        Ok(status)
    }

    fn malformed(&self, min: usize) -> WireShockError {
        WireShockError::Malformed {
            code: self.code,
            len: self.buffer.len(),
            min,
        }
    }
}

fn read_u16(buffer: &[u8], offset: usize) -> Option<u16> {
    let bytes = buffer.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Command Complete event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandComplete<'a> {
    /// Number of command packets the controller accepts now
    pub num_hci_command_packets: u8,
    /// Opcode of the completed command
    pub opcode: u16,
    /// Status of the completed command
    pub status: Status,
    /// Return parameters following the status
    pub return_parameters: &'a [u8],
}

impl CommandComplete<'_> {
    /// Completed command, if it is one this core issues
    #[must_use]
    pub fn command(&self) -> Option<HciOpcode> {
        HciOpcode::from_raw(self.opcode)
    }

    /// Whether the command completed with a success status
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.to_result().is_ok()
    }

    /// `BD_ADDR` returned by Read BD ADDR
    #[must_use]
    pub fn bd_addr(&self) -> Option<BluetoothAddress> {
        let (bd_addr, _) =
            <ReadBdAddr as SyncCmd>::Return::from_hci_bytes(self.return_parameters).ok()?;
        BluetoothAddress::try_from(bd_addr).ok()
    }

    /// Version record returned by Read Local Version Information
    ///
    /// The major versions are kept as raw bytes; the rest comes from the
    /// bt-hci return type.
    #[must_use]
    pub fn local_version(&self) -> Option<LocalVersion> {
        let (info, _) =
            <ReadLocalVersionInformation as SyncCmd>::Return::from_hci_bytes(self.return_parameters)
                .ok()?;
        Some(LocalVersion {
            hci_version: CoreVersion(*self.return_parameters.first()?),
            hci_revision: info.hci_subversion,
            lmp_version: CoreVersion(*self.return_parameters.get(3)?),
            manufacturer_name: info.company_identifier,
            lmp_subversion: info.lmp_subversion,
        })
    }

    /// Buffer sizes returned by Read Buffer Size
    #[must_use]
    pub fn buffer_size(&self) -> Option<BufferSize> {
        let p = self.return_parameters.get(..7)?;
        Some(BufferSize {
            acl_data_packet_length: u16::from_le_bytes([p[0], p[1]]),
            sco_data_packet_length: p[2],
            total_num_acl_data_packets: u16::from_le_bytes([p[3], p[4]]),
            total_num_sco_data_packets: u16::from_le_bytes([p[5], p[6]]),
        })
    }
}

/// Controller version information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocalVersion {
    /// HCI major version
    pub hci_version: CoreVersion,
    /// HCI revision
    pub hci_revision: u16,
    /// LMP major version
    pub lmp_version: CoreVersion,
    /// Manufacturer (company identifier)
    pub manufacturer_name: u16,
    /// LMP subversion
    pub lmp_subversion: u16,
}

/// Controller data buffer sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferSize {
    /// Maximum ACL data packet length
    pub acl_data_packet_length: u16,
    /// Maximum SCO data packet length
    pub sco_data_packet_length: u8,
    /// Number of ACL data packets the controller buffers
    pub total_num_acl_data_packets: u16,
    /// Number of SCO data packets the controller buffers
    pub total_num_sco_data_packets: u16,
}

/// Command Status event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandStatus {
    /// Status of the pending command
    pub status: Status,
    /// Number of command packets the controller accepts now
    pub num_hci_command_packets: u8,
    /// Opcode of the pending command
    pub opcode: u16,
}

impl CommandStatus {
    /// Pending command, if it is one this core issues
    #[must_use]
    pub fn command(&self) -> Option<HciOpcode> {
        HciOpcode::from_raw(self.opcode)
    }
}

/// Connection Request event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionRequest {
    /// Peer asking to connect
    pub bd_addr: BluetoothAddress,
    /// Class of Device of the peer (wire order)
    pub class_of_device: [u8; CLASS_OF_DEVICE_LENGTH],
    /// Requested link type
    pub link_type: u8,
}

/// Connection Complete event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionComplete {
    /// Result of the connection attempt
    pub status: Status,
    /// Handle of the new link (tagged)
    pub handle: AclHandle,
    /// Connected peer
    pub bd_addr: BluetoothAddress,
}

/// Disconnection Complete event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisconnectionComplete {
    /// Result of the disconnection
    pub status: Status,
    /// Handle of the closed link (tagged)
    pub handle: AclHandle,
    /// Reason the link was closed
    pub reason: Status,
}

/// Remote Name Request Complete event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteNameRequestComplete<'a> {
    /// Result of the name request
    pub status: Status,
    /// Peer the name belongs to
    pub bd_addr: BluetoothAddress,
    /// Name bytes up to the first null byte
    pub name: &'a [u8],
}

/// Role Change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoleChange {
    /// Result of the role switch
    pub status: Status,
    /// Peer of the link
    pub bd_addr: BluetoothAddress,
    /// New role of the controller (0x00 master, 0x01 slave)
    pub role: u8,
}

/// Page Scan Repetition Mode Change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageScanRepetitionModeChange {
    /// Peer whose mode changed
    pub bd_addr: BluetoothAddress,
    /// New page scan repetition mode (0 = R0, 1 = R1, 2 = R2)
    pub mode: u8,
}

/// A decoded HCI event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HciEvent<'a> {
    /// Command Complete
    CommandComplete(CommandComplete<'a>),
    /// Command Status
    CommandStatus(CommandStatus),
    /// Connection Request
    ConnectionRequest(ConnectionRequest),
    /// Connection Complete
    ConnectionComplete(ConnectionComplete),
    /// Disconnection Complete
    DisconnectionComplete(DisconnectionComplete),
    /// Remote Name Request Complete
    RemoteNameRequestComplete(RemoteNameRequestComplete<'a>),
    /// Role Change
    RoleChange(RoleChange),
    /// Page Scan Repetition Mode Change
    PageScanRepetitionModeChange(PageScanRepetitionModeChange),
    /// Number Of Completed Packets (ACL flow control belongs to the data path)
    NumberOfCompletedPackets,
    /// Pairing related request or notification this core does not answer
    Pairing {
        /// Which pairing event arrived
        code: EventCode,
        /// Peer the event refers to
        bd_addr: BluetoothAddress,
    },
    /// Any other event code
    Unknown(u8),
}

impl<'a> HciEvent<'a> {
    /// Build the typed view of a raw event
    ///
    /// # Errors
    /// Returns `WireShockError::Malformed` when the transfer is shorter than the
    /// fixed layout of a recognized event or does not parse.
    pub fn parse(raw: &RawEvent<'a>) -> Result<Self, WireShockError> {
        let Some(code) = EventCode::from_u8(raw.code) else {
            return Ok(Self::Unknown(raw.code));
        };

        let min = code.min_length();
        if raw.len() < min {
            return Err(raw.malformed(min));
        }

        let event = match code {
            EventCode::ConnectionRequest => {
                let cod_offset = CONNECTION_REQUEST_ADDR_OFFSET + BD_ADDR_LENGTH;
                Self::ConnectionRequest(ConnectionRequest {
                    bd_addr: raw.address(CONNECTION_REQUEST_ADDR_OFFSET)?,
                    class_of_device: [
                        raw.byte(cod_offset),
                        raw.byte(cod_offset + 1),
                        raw.byte(cod_offset + 2),
                    ],
                    link_type: raw.byte(cod_offset + CLASS_OF_DEVICE_LENGTH),
                })
            }
            EventCode::RoleChange => Self::RoleChange(RoleChange {
                status: raw.status(EVENT_PARAMETERS_OFFSET)?,
                bd_addr: raw.address(STATUS_ADDR_OFFSET)?,
                role: raw.byte(ROLE_OFFSET),
            }),
            EventCode::PageScanRepetitionModeChange => {
                Self::PageScanRepetitionModeChange(PageScanRepetitionModeChange {
                    bd_addr: raw.address(PAGE_SCAN_ADDR_OFFSET)?,
                    mode: raw.byte(PAGE_SCAN_MODE_OFFSET),
                })
            }
            _ => Self::from_bt_hci(raw, code, min)?,
        };

        Ok(event)
    }

    fn from_bt_hci(raw: &RawEvent<'a>, code: EventCode, min: usize) -> Result<Self, WireShockError> {
        let (event, _) = Event::from_hci_bytes(raw.buffer).map_err(|_| {
            warn!("[DECODER] bt-hci rejected event 0x{:02X}", raw.code);
            raw.malformed(min)
        })?;
        let address = |bd_addr: BdAddr| {
            BluetoothAddress::try_from(bd_addr).map_err(|_| raw.malformed(min))
        };

        let event = match event {
            Event::CommandComplete(ref complete) => Self::CommandComplete(CommandComplete {
                num_hci_command_packets: complete.num_hci_cmd_pkts,
                opcode: complete.cmd_opcode.to_raw(),
                status: complete.status,
                // Return parameters follow packets, opcode and status
                return_parameters: raw.parameters().get(4..).unwrap_or_default(),
            }),
            Event::CommandStatus(ref status) => Self::CommandStatus(CommandStatus {
                status: status.status,
                num_hci_command_packets: status.num_hci_cmd_pkts,
                opcode: status.cmd_opcode.to_raw(),
            }),
            Event::ConnectionComplete(ref complete) => {
                let [lsb, msb] = complete.handle.raw().to_le_bytes();
                Self::ConnectionComplete(ConnectionComplete {
                    status: complete.status,
                    handle: AclHandle::from_event_bytes(lsb, msb),
                    bd_addr: address(complete.bd_addr)?,
                })
            }
            Event::DisconnectionComplete(ref complete) => {
                let [lsb, msb] = complete.handle.raw().to_le_bytes();
                Self::DisconnectionComplete(DisconnectionComplete {
                    status: complete.status,
                    handle: AclHandle::from_event_bytes(lsb, msb),
                    reason: raw.status(LINK_HANDLE_OFFSET + 2)?,
                })
            }
            Event::RemoteNameRequestComplete(ref complete) => {
                Self::RemoteNameRequestComplete(RemoteNameRequestComplete {
                    status: complete.status,
                    bd_addr: address(complete.bd_addr)?,
                    name: scan_remote_name(raw.buffer),
                })
            }
            Event::NumberOfCompletedPackets(_) => Self::NumberOfCompletedPackets,
            Event::PinCodeRequest(ref request) => Self::pairing(code, address(request.bd_addr)?),
            Event::LinkKeyRequest(ref request) => Self::pairing(code, address(request.bd_addr)?),
            Event::LinkKeyNotification(ref notification) => {
                Self::pairing(code, address(notification.bd_addr)?)
            }
            Event::IoCapabilityRequest(ref request) => {
                Self::pairing(code, address(request.bd_addr)?)
            }
            Event::UserConfirmationRequest(ref request) => {
                Self::pairing(code, address(request.bd_addr)?)
            }
            _ => {
                warn!("[DECODER] Event 0x{:02X} parsed to an unexpected variant", raw.code);
                Self::Unknown(raw.code)
            }
        };

        Ok(event)
    }

    fn pairing(code: EventCode, bd_addr: BluetoothAddress) -> Self {
        Self::Pairing { code, bd_addr }
    }
}

/// Remote name bytes of a Remote Name Request Complete transfer
///
/// Stops at the first null byte or after [`MAX_REMOTE_NAME_LENGTH`] bytes.
fn scan_remote_name(buffer: &[u8]) -> &[u8] {
    let field = buffer.get(REMOTE_NAME_OFFSET..).unwrap_or(&[]);
    let field = &field[..field.len().min(MAX_REMOTE_NAME_LENGTH)];
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..len]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

    fn parse(buffer: &[u8]) -> Result<HciEvent<'_>, WireShockError> {
        HciEvent::parse(&RawEvent::decode(buffer).unwrap())
    }

    /// Remote Name Request Complete with the full 248 byte name field
    fn remote_name_event(status: u8, name: &[u8]) -> [u8; 257] {
        let mut buffer = [0u8; 257];
        buffer[..3].copy_from_slice(&[0x07, 0xFF, status]);
        buffer[3..9].copy_from_slice(&ADDR);
        buffer[9..9 + name.len()].copy_from_slice(name);
        buffer
    }

    #[test]
    fn test_decode_empty_transfer() {
        assert_eq!(RawEvent::decode(&[]), None);
    }

    #[test]
    fn test_decode_command_complete() {
        // Read BD ADDR complete
        let buffer = [
            0x0E, 0x0A, 0x01, 0x09, 0x10, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66,
        ];
        let raw = RawEvent::decode(&buffer).unwrap();
        assert_eq!(raw.code, 0x0E);
        assert_eq!(raw.opcode, Some(0x1009));
        assert_eq!(raw.status, Some(0x00));
        assert_eq!(raw.payload, &buffer[5..]);

        match HciEvent::parse(&raw) {
            Ok(HciEvent::CommandComplete(cc)) => {
                assert_eq!(cc.num_hci_command_packets, 1);
                assert_eq!(cc.command(), Some(HciOpcode::ReadBdAddr));
                assert!(cc.is_success());
                assert_eq!(cc.return_parameters, &ADDR);
                assert_eq!(cc.bd_addr(), Some(BluetoothAddress::new(ADDR)));
            }
            other => panic!("Did not get command complete: {:?}", other),
        }
    }

    #[test]
    fn test_decode_command_complete_failure_status() {
        let buffer = [0x0E, 0x04, 0x01, 0x56, 0x0C, 0x11];
        match parse(&buffer) {
            Ok(HciEvent::CommandComplete(cc)) => {
                assert_eq!(cc.command(), Some(HciOpcode::WriteSimplePairingMode));
                assert_eq!(cc.status, Status::new(0x11));
                assert!(!cc.is_success());
                assert!(cc.return_parameters.is_empty());
            }
            other => panic!("Did not get command complete: {:?}", other),
        }
    }

    #[test]
    fn test_decode_command_complete_without_status_fails_closed() {
        assert!(matches!(
            parse(&[0x0E, 0x03, 0x01, 0x03, 0x0C]),
            Err(WireShockError::Malformed { code: 0x0E, .. })
        ));
    }

    #[test]
    fn test_decode_local_version() {
        let buffer = [
            0x0E, 0x0C, 0x01, 0x01, 0x10, 0x00, 0x06, 0x00, 0x10, 0x06, 0x0F, 0x00, 0x34, 0x12,
        ];
        let Ok(HciEvent::CommandComplete(cc)) = parse(&buffer) else {
            panic!("Did not get command complete");
        };
        let version = cc.local_version().unwrap();
        assert_eq!(version.hci_version, CoreVersion(6));
        assert_eq!(version.hci_revision, 0x1000);
        assert_eq!(version.lmp_version, CoreVersion(6));
        assert_eq!(version.manufacturer_name, 0x000F);
        assert_eq!(version.lmp_subversion, 0x1234);

        // Truncated return parameters yield no version record
        let truncated = CommandComplete {
            return_parameters: &cc.return_parameters[..5],
            ..cc
        };
        assert_eq!(truncated.local_version(), None);
    }

    #[test]
    fn test_decode_buffer_size() {
        let buffer = [
            0x0E, 0x0B, 0x01, 0x05, 0x10, 0x00, 0xFD, 0x03, 0x40, 0x08, 0x00, 0x01, 0x00,
        ];
        let Ok(HciEvent::CommandComplete(cc)) = parse(&buffer) else {
            panic!("Did not get command complete");
        };
        assert_eq!(
            cc.buffer_size(),
            Some(BufferSize {
                acl_data_packet_length: 1021,
                sco_data_packet_length: 64,
                total_num_acl_data_packets: 8,
                total_num_sco_data_packets: 1,
            })
        );
    }

    #[test]
    fn test_decode_command_status() {
        let buffer = [0x0F, 0x04, 0x0C, 0x01, 0x56, 0x0C];
        let raw = RawEvent::decode(&buffer).unwrap();
        assert_eq!(raw.status, Some(0x0C));
        assert_eq!(raw.opcode, Some(0x0C56));

        match HciEvent::parse(&raw) {
            Ok(HciEvent::CommandStatus(cs)) => {
                assert_eq!(cs.status, Status::new(0x0C));
                assert!(cs.status.to_result().is_err());
                assert_eq!(cs.num_hci_command_packets, 1);
                assert_eq!(cs.command(), Some(HciOpcode::WriteSimplePairingMode));
            }
            other => panic!("Did not get command status: {:?}", other),
        }
    }

    #[test]
    fn test_decode_connection_request() {
        let buffer = [
            0x04, 0x0A, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x08, 0x05, 0x00, 0x01,
        ];
        match parse(&buffer) {
            Ok(HciEvent::ConnectionRequest(request)) => {
                assert_eq!(request.bd_addr, BluetoothAddress::new(ADDR));
                assert_eq!(request.class_of_device, [0x08, 0x05, 0x00]);
                assert_eq!(request.link_type, 0x01);
            }
            other => panic!("Did not get connection request: {:?}", other),
        }
    }

    #[test]
    fn test_decode_connection_complete_tags_handle() {
        let buffer = [
            0x03, 0x0B, 0x00, 0x02, 0x01, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x01, 0x00,
        ];
        match parse(&buffer) {
            Ok(HciEvent::ConnectionComplete(complete)) => {
                assert!(complete.status.to_result().is_ok());
                assert_eq!(complete.handle.lsb(), 0x02);
                assert_eq!(complete.handle.msb(), 0x21);
                assert_eq!(complete.bd_addr, BluetoothAddress::new(ADDR));
            }
            other => panic!("Did not get connection complete: {:?}", other),
        }
    }

    #[test]
    fn test_decode_disconnection_complete() {
        let buffer = [0x05, 0x04, 0x00, 0x0B, 0x00, 0x13];
        match parse(&buffer) {
            Ok(HciEvent::DisconnectionComplete(complete)) => {
                assert!(complete.status.to_result().is_ok());
                assert_eq!(complete.handle, AclHandle::from_event_bytes(0x0B, 0x20));
                assert_eq!(complete.reason, Status::new(0x13));
            }
            other => panic!("Did not get disconnection complete: {:?}", other),
        }
    }

    #[test]
    fn test_decode_remote_name() {
        let buffer = remote_name_event(0x00, b"Wireless Controller");

        match parse(&buffer) {
            Ok(HciEvent::RemoteNameRequestComplete(complete)) => {
                assert!(complete.status.to_result().is_ok());
                assert_eq!(complete.bd_addr, BluetoothAddress::new(ADDR));
                assert_eq!(complete.name, b"Wireless Controller");
            }
            other => panic!("Did not get remote name: {:?}", other),
        }
    }

    #[test]
    fn test_decode_remote_name_fills_whole_field() {
        // No terminator: the name is capped at the field length
        let buffer = remote_name_event(0x00, &[b'A'; MAX_REMOTE_NAME_LENGTH]);
        let Ok(HciEvent::RemoteNameRequestComplete(complete)) = parse(&buffer) else {
            panic!("Did not get remote name");
        };
        assert_eq!(complete.name.len(), MAX_REMOTE_NAME_LENGTH);

        // Empty name
        let buffer = remote_name_event(0x04, b"");
        let Ok(HciEvent::RemoteNameRequestComplete(complete)) = parse(&buffer) else {
            panic!("Did not get remote name");
        };
        assert!(complete.name.is_empty());
        assert_eq!(complete.status, Status::new(0x04));
    }

    #[test]
    fn test_decode_role_change() {
        let buffer = [
            0x12, 0x08, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x01,
        ];
        match parse(&buffer) {
            Ok(HciEvent::RoleChange(change)) => {
                assert!(change.status.to_result().is_ok());
                assert_eq!(change.bd_addr, BluetoothAddress::new(ADDR));
                assert_eq!(change.role, 0x01);
            }
            other => panic!("Did not get role change: {:?}", other),
        }
    }

    #[test]
    fn test_decode_page_scan_repetition_mode_change() {
        let buffer = [0x20, 0x07, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x02];
        match parse(&buffer) {
            Ok(HciEvent::PageScanRepetitionModeChange(change)) => {
                assert_eq!(change.bd_addr, BluetoothAddress::new(ADDR));
                assert_eq!(change.mode, 0x02);
            }
            other => panic!("Did not get page scan change: {:?}", other),
        }
    }

    #[test]
    fn test_decode_pairing_events() {
        let buffer = [0x17, 0x06, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
        assert!(matches!(
            parse(&buffer),
            Ok(HciEvent::Pairing {
                code: EventCode::LinkKeyRequest,
                bd_addr,
            }) if bd_addr == BluetoothAddress::new(ADDR)
        ));
        assert!(matches!(
            parse(&[0x13, 0x05, 0x01, 0x0B, 0x00, 0x01, 0x00]),
            Ok(HciEvent::NumberOfCompletedPackets)
        ));
    }

    #[test]
    fn test_decode_unknown_event_is_not_an_error() {
        assert!(matches!(parse(&[0xFF, 0x00]), Ok(HciEvent::Unknown(0xFF))));
        assert!(matches!(parse(&[0x3E]), Ok(HciEvent::Unknown(0x3E))));
    }

    #[test]
    fn test_decode_truncated_events_fail_closed() {
        assert_eq!(
            parse(&[0x03, 0x0B, 0x00, 0x02, 0x01, 0x11, 0x22]).err(),
            Some(WireShockError::Malformed {
                code: 0x03,
                len: 7,
                min: 11
            })
        );
        assert!(parse(&[0x0E, 0x01, 0x01]).is_err());
        assert!(parse(&[0x0F, 0x04, 0x00, 0x01, 0x56]).is_err());
        assert!(parse(&[0x05, 0x04, 0x00, 0x0B]).is_err());
        assert!(parse(&[0x07, 0xFF, 0x00, 0x11]).is_err());
        assert!(parse(&[0x04]).is_err());

        // Long enough for the fixed fields but shorter than announced
        let buffer = remote_name_event(0x00, b"Motion");
        assert!(parse(&buffer[..40]).is_err());
    }
}
