//! `WireShock` Constants
//!
//! Fixed HCI layout offsets, capacities and default controller parameters used
//! throughout the crate. Offsets are absolute positions in the raw interrupt
//! transfer buffer (byte 0 is the event code, byte 1 the parameter length).

/// `BD_ADDR` length in bytes
pub const BD_ADDR_LENGTH: usize = 6;

/// Class of Device length in bytes
pub const CLASS_OF_DEVICE_LENGTH: usize = 3;

/// Maximum remote name length in bytes (HCI `Remote_Name` parameter size)
pub const MAX_REMOTE_NAME_LENGTH: usize = 248;

/// Maximum number of remote devices tracked at once (a power of two greater than one)
pub const MAX_REMOTE_DEVICES: usize = 8;

/// Depth of the outgoing command queue
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Transfer length of a single interrupt endpoint read (fits the largest HCI event)
pub const INTERRUPT_IN_BUFFER_LENGTH: usize = 512;

/// Largest encoded HCI command packet (3 header bytes + 255 parameter bytes)
pub const MAX_COMMAND_PACKET_LENGTH: usize = 258;

/// Length of the Extended Inquiry Response data block
pub const EXTENDED_INQUIRY_RESPONSE_LENGTH: usize = 240;

/// Tag bit OR-ed into the high byte of every ACL handle reported by the controller
pub const ACL_HANDLE_TAG: u8 = 0x20;

/// Generic event parameters start after the event code and length bytes
pub const EVENT_PARAMETERS_OFFSET: usize = 2;

/// Command Complete: opcode (little-endian) position
pub const COMMAND_COMPLETE_OPCODE_OFFSET: usize = 3;

/// Command Complete: return parameters (status first) position
pub const COMMAND_COMPLETE_PAYLOAD_OFFSET: usize = 5;

/// Command Status: status byte position
pub const COMMAND_STATUS_STATUS_OFFSET: usize = 2;

/// Command Status: opcode (little-endian) position
pub const COMMAND_STATUS_OPCODE_OFFSET: usize = 4;

/// Connection Request: peer address position
pub const CONNECTION_REQUEST_ADDR_OFFSET: usize = 2;

/// Connection Complete / Disconnection Complete: handle position
pub const LINK_HANDLE_OFFSET: usize = 3;

/// Connection Complete: peer address position
pub const CONNECTION_COMPLETE_ADDR_OFFSET: usize = 5;

/// Remote Name Request Complete / Role Change: peer address position
pub const STATUS_ADDR_OFFSET: usize = 3;

/// Remote Name Request Complete: name position
pub const REMOTE_NAME_OFFSET: usize = 9;

/// Role Change: new role position
pub const ROLE_OFFSET: usize = 9;

/// Page Scan Repetition Mode Change: peer address position
pub const PAGE_SCAN_ADDR_OFFSET: usize = 2;

/// Page Scan Repetition Mode Change: mode position
pub const PAGE_SCAN_MODE_OFFSET: usize = 8;

/// Lowest HCI/LMP major version able to host DualShock 3 controllers (Bluetooth 2.0 + EDR)
pub const MIN_SUPPORTED_VERSION: u8 = 3;

/// Lowest HCI/LMP major version able to host DualShock 4 controllers (Bluetooth 2.1 + EDR)
pub const DUALSHOCK_4_VERSION: u8 = 4;

/// Role parameter of Accept Connection Request: become master
pub const ROLE_MASTER: u8 = 0x00;

/// Default page timeout (0x2000 * 0.625ms = 5.12s)
pub const DEFAULT_PAGE_TIMEOUT: u16 = 0x2000;

/// Default page/inquiry scan interval (0x0400 * 0.625ms = 640ms)
pub const DEFAULT_SCAN_INTERVAL: u16 = 0x0400;

/// Default page/inquiry scan window (0x0012 * 0.625ms = 11.25ms)
pub const DEFAULT_SCAN_WINDOW: u16 = 0x0012;

/// Interlaced page/inquiry scan
pub const INTERLACED_SCAN: u8 = 0x01;

/// Standard inquiry result format
pub const STANDARD_INQUIRY_MODE: u8 = 0x00;

/// Page scan enabled, inquiry scan disabled
pub const PAGE_SCAN_ONLY: u8 = 0x02;

/// Event mask enabling every Bluetooth 2.1 event
pub const DEFAULT_EVENT_MASK: u64 = 0x1FFF_FFFF_FFFF_FFFF;

/// Class of Device advertised by the adapter (wire order)
pub const DEFAULT_CLASS_OF_DEVICE: [u8; CLASS_OF_DEVICE_LENGTH] = [0x08, 0x25, 0x00];

/// Local name advertised by the adapter
pub const DEFAULT_LOCAL_NAME: &str = "WireShock";

/// Page scan repetition mode R1, used for Remote Name Request
pub const PAGE_SCAN_REPETITION_MODE_R1: u8 = 0x01;

/// EIR data type: complete local name
pub const EIR_COMPLETE_LOCAL_NAME: u8 = 0x09;
