//! Outgoing HCI commands
//!
//! The bring-up chain and the connection lifecycle never talk to the USB
//! transport directly. They hand an [`HciCommand`] to a [`CommandEncoder`],
//! which only reports whether the submission was accepted. The reply arrives
//! later as a fresh event.
//!
//! [`ChannelEncoder`] is the encoder used at runtime: it enqueues commands on
//! an `embassy-sync` channel that `processor::command_processor` drains into
//! the USB control endpoint, encoding each one with [`HciCommand::encode`].

use crate::{
    AdapterOptions, BluetoothAddress, WireShockError,
    constants::{
        EIR_COMPLETE_LOCAL_NAME, EXTENDED_INQUIRY_RESPONSE_LENGTH, MAX_COMMAND_PACKET_LENGTH,
        MAX_REMOTE_NAME_LENGTH, PAGE_SCAN_REPETITION_MODE_R1,
    },
};
use bt_hci::{
    FromHciBytes, WriteHci,
    cmd::{
        Cmd, Opcode, OpcodeGroup,
        controller_baseband::{Reset, SetEventMask},
        info::{ReadBdAddr, ReadLocalVersionInformation},
    },
    param::{BdAddr, EventMask},
};
use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Sender};
use heapless::Vec;

/// Encoded HCI command packet
pub type CommandPacket = Vec<u8, MAX_COMMAND_PACKET_LENGTH>;

/// Every command this core issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HciOpcode {
    /// Accept Connection Request
    AcceptConnectionRequest,
    /// Remote Name Request
    RemoteNameRequest,
    /// Set Event Mask
    SetEventMask,
    /// Reset
    Reset,
    /// Delete Stored Link Key
    DeleteStoredLinkKey,
    /// Write Local Name
    WriteLocalName,
    /// Write Page Timeout
    WritePageTimeout,
    /// Write Scan Enable
    WriteScanEnable,
    /// Write Page Scan Activity
    WritePageScanActivity,
    /// Write Inquiry Scan Activity
    WriteInquiryScanActivity,
    /// Write Authentication Enable
    WriteAuthenticationEnable,
    /// Write Class of Device
    WriteClassOfDevice,
    /// Write Inquiry Scan Type
    WriteInquiryScanType,
    /// Write Inquiry Mode
    WriteInquiryMode,
    /// Write Page Scan Type
    WritePageScanType,
    /// Write Extended Inquiry Response
    WriteExtendedInquiryResponse,
    /// Write Simple Pairing Mode
    WriteSimplePairingMode,
    /// Read Local Version Information
    ReadLocalVersionInfo,
    /// Read Buffer Size
    ReadBufferSize,
    /// Read BD ADDR
    ReadBdAddr,
    /// Write Simple Pairing Debug Mode
    WriteSimplePairingDebugMode,
}

impl HciOpcode {
    const ALL: [Self; 21] = [
        Self::AcceptConnectionRequest,
        Self::RemoteNameRequest,
        Self::SetEventMask,
        Self::Reset,
        Self::DeleteStoredLinkKey,
        Self::WriteLocalName,
        Self::WritePageTimeout,
        Self::WriteScanEnable,
        Self::WritePageScanActivity,
        Self::WriteInquiryScanActivity,
        Self::WriteAuthenticationEnable,
        Self::WriteClassOfDevice,
        Self::WriteInquiryScanType,
        Self::WriteInquiryMode,
        Self::WritePageScanType,
        Self::WriteExtendedInquiryResponse,
        Self::WriteSimplePairingMode,
        Self::ReadLocalVersionInfo,
        Self::ReadBufferSize,
        Self::ReadBdAddr,
        Self::WriteSimplePairingDebugMode,
    ];

    /// bt-hci opcode (OGF and OCF)
    #[must_use]
    pub fn opcode(self) -> Opcode {
        use OpcodeGroup as Ogf;
        match self {
            Self::AcceptConnectionRequest => Opcode::new(Ogf::LINK_CONTROL, 0x0009),
            Self::RemoteNameRequest => Opcode::new(Ogf::LINK_CONTROL, 0x0019),
            Self::SetEventMask => SetEventMask::OPCODE,
            Self::Reset => Reset::OPCODE,
            Self::DeleteStoredLinkKey => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0012),
            Self::WriteLocalName => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0013),
            Self::WritePageTimeout => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0018),
            Self::WriteScanEnable => Opcode::new(Ogf::CONTROL_BASEBAND, 0x001A),
            Self::WritePageScanActivity => Opcode::new(Ogf::CONTROL_BASEBAND, 0x001C),
            Self::WriteInquiryScanActivity => Opcode::new(Ogf::CONTROL_BASEBAND, 0x001E),
            Self::WriteAuthenticationEnable => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0020),
            Self::WriteClassOfDevice => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0024),
            Self::WriteInquiryScanType => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0043),
            Self::WriteInquiryMode => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0045),
            Self::WritePageScanType => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0047),
            Self::WriteExtendedInquiryResponse => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0052),
            Self::WriteSimplePairingMode => Opcode::new(Ogf::CONTROL_BASEBAND, 0x0056),
            Self::ReadLocalVersionInfo => ReadLocalVersionInformation::OPCODE,
            Self::ReadBufferSize => Opcode::new(Ogf::INFO_PARAMS, 0x0005),
            Self::ReadBdAddr => ReadBdAddr::OPCODE,
            Self::WriteSimplePairingDebugMode => Opcode::new(Ogf::TESTING, 0x0004),
        }
    }

    /// Raw 16-bit opcode
    #[must_use]
    pub fn raw(self) -> u16 {
        self.opcode().to_raw()
    }

    /// Convert from a raw opcode found in Command Complete / Command Status
    #[must_use]
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|opcode| opcode.raw() == raw)
    }
}

/// A command to be issued to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HciCommand {
    /// Reset
    Reset,
    /// Read BD ADDR
    ReadBdAddr,
    /// Read Buffer Size
    ReadBufferSize,
    /// Read Local Version Information
    ReadLocalVersionInfo,
    /// Write Simple Pairing Mode
    WriteSimplePairingMode,
    /// Write Simple Pairing Debug Mode
    WriteSimplePairingDebugMode,
    /// Write Authentication Enable
    WriteAuthenticationEnable,
    /// Set Event Mask
    SetEventMask,
    /// Write Page Timeout
    WritePageTimeout,
    /// Write Page Scan Activity
    WritePageScanActivity,
    /// Write Page Scan Type
    WritePageScanType,
    /// Write Inquiry Scan Activity
    WriteInquiryScanActivity,
    /// Write Inquiry Scan Type
    WriteInquiryScanType,
    /// Write Inquiry Mode
    WriteInquiryMode,
    /// Write Class of Device
    WriteClassOfDevice,
    /// Write Extended Inquiry Response
    WriteExtendedInquiryResponse,
    /// Write Local Name
    WriteLocalName,
    /// Write Scan Enable
    WriteScanEnable,
    /// Delete the stored link key of one peer
    DeleteStoredLinkKey(BluetoothAddress),
    /// Accept an incoming connection, switching to `role`
    AcceptConnectionRequest {
        /// Peer to accept
        bd_addr: BluetoothAddress,
        /// 0x00 become master, 0x01 remain slave
        role: u8,
    },
    /// Ask a connected peer for its name
    RemoteNameRequest(BluetoothAddress),
}

impl HciCommand {
    /// Opcode of the command
    #[must_use]
    pub fn opcode(&self) -> HciOpcode {
        match self {
            Self::Reset => HciOpcode::Reset,
            Self::ReadBdAddr => HciOpcode::ReadBdAddr,
            Self::ReadBufferSize => HciOpcode::ReadBufferSize,
            Self::ReadLocalVersionInfo => HciOpcode::ReadLocalVersionInfo,
            Self::WriteSimplePairingMode => HciOpcode::WriteSimplePairingMode,
            Self::WriteSimplePairingDebugMode => HciOpcode::WriteSimplePairingDebugMode,
            Self::WriteAuthenticationEnable => HciOpcode::WriteAuthenticationEnable,
            Self::SetEventMask => HciOpcode::SetEventMask,
            Self::WritePageTimeout => HciOpcode::WritePageTimeout,
            Self::WritePageScanActivity => HciOpcode::WritePageScanActivity,
            Self::WritePageScanType => HciOpcode::WritePageScanType,
            Self::WriteInquiryScanActivity => HciOpcode::WriteInquiryScanActivity,
            Self::WriteInquiryScanType => HciOpcode::WriteInquiryScanType,
            Self::WriteInquiryMode => HciOpcode::WriteInquiryMode,
            Self::WriteClassOfDevice => HciOpcode::WriteClassOfDevice,
            Self::WriteExtendedInquiryResponse => HciOpcode::WriteExtendedInquiryResponse,
            Self::WriteLocalName => HciOpcode::WriteLocalName,
            Self::WriteScanEnable => HciOpcode::WriteScanEnable,
            Self::DeleteStoredLinkKey(_) => HciOpcode::DeleteStoredLinkKey,
            Self::AcceptConnectionRequest { .. } => HciOpcode::AcceptConnectionRequest,
            Self::RemoteNameRequest(_) => HciOpcode::RemoteNameRequest,
        }
    }

    /// Encode the command as an HCI command packet
    ///
    /// Layout: opcode (little-endian), parameter length, parameters. Controller
    /// parameters come from `options`.
    ///
    /// # Errors
    /// Returns `WireShockError::InvalidParameter` if the parameters do not fit
    /// in a single command packet.
    pub fn encode(&self, options: &AdapterOptions) -> Result<CommandPacket, WireShockError> {
        match *self {
            Self::Reset => write_cmd(&Reset::new()),
            Self::ReadBdAddr => write_cmd(&ReadBdAddr::new()),
            Self::ReadLocalVersionInfo => write_cmd(&ReadLocalVersionInformation::new()),
            Self::SetEventMask => {
                let (mask, _) = EventMask::from_hci_bytes(&options.event_mask.to_le_bytes())
                    .map_err(|_| WireShockError::InvalidParameter)?;
                write_cmd(&SetEventMask::new(mask))
            }
            _ => {
                let mut packet = CommandPacket::new();
                packet
                    .extend_from_slice(&self.opcode().raw().to_le_bytes())
                    .map_err(|()| WireShockError::InvalidParameter)?;
                // Parameter length, patched once the parameters are written
                packet.push(0).map_err(|_| WireShockError::InvalidParameter)?;

                self.write_parameters(options, &mut packet)
                    .map_err(|()| WireShockError::InvalidParameter)?;

                packet[2] = u8::try_from(packet.len() - 3)
                    .map_err(|_| WireShockError::InvalidParameter)?;
                Ok(packet)
            }
        }
    }

    fn write_parameters(&self, options: &AdapterOptions, out: &mut CommandPacket) -> Result<(), ()> {
        match *self {
            Self::Reset
            | Self::ReadBdAddr
            | Self::ReadBufferSize
            | Self::ReadLocalVersionInfo
            | Self::SetEventMask => Ok(()),
            Self::WriteSimplePairingMode => push(out, options.simple_pairing_mode),
            Self::WriteSimplePairingDebugMode => push(out, options.simple_pairing_debug_mode),
            Self::WriteAuthenticationEnable => push(out, options.authentication_enable),
            Self::WritePageTimeout => out.extend_from_slice(&options.page_timeout.to_le_bytes()),
            Self::WritePageScanActivity => {
                out.extend_from_slice(&options.page_scan_interval.to_le_bytes())?;
                out.extend_from_slice(&options.page_scan_window.to_le_bytes())
            }
            Self::WritePageScanType => push(out, options.page_scan_type),
            Self::WriteInquiryScanActivity => {
                out.extend_from_slice(&options.inquiry_scan_interval.to_le_bytes())?;
                out.extend_from_slice(&options.inquiry_scan_window.to_le_bytes())
            }
            Self::WriteInquiryScanType => push(out, options.inquiry_scan_type),
            Self::WriteInquiryMode => push(out, options.inquiry_mode),
            Self::WriteClassOfDevice => out.extend_from_slice(&options.class_of_device),
            Self::WriteExtendedInquiryResponse => {
                // FEC required
                push(out, 0x01)?;
                let start = out.len();
                let name = options.local_name.as_bytes();
                let name = &name[..name.len().min(EXTENDED_INQUIRY_RESPONSE_LENGTH - 2)];
                push(out, u8::try_from(name.len() + 1).map_err(|_| ())?)?;
                push(out, EIR_COMPLETE_LOCAL_NAME)?;
                out.extend_from_slice(name)?;
                out.resize(start + EXTENDED_INQUIRY_RESPONSE_LENGTH, 0)
            }
            Self::WriteLocalName => {
                let start = out.len();
                let name = options.local_name.as_bytes();
                // Keep room for the terminating null
                let name = &name[..name.len().min(MAX_REMOTE_NAME_LENGTH - 1)];
                out.extend_from_slice(name)?;
                out.resize(start + MAX_REMOTE_NAME_LENGTH, 0)
            }
            Self::WriteScanEnable => push(out, options.scan_enable),
            Self::DeleteStoredLinkKey(addr) => {
                write_bd_addr(out, addr)?;
                // Delete only the key of this peer
                push(out, 0x00)
            }
            Self::AcceptConnectionRequest { bd_addr, role } => {
                write_bd_addr(out, bd_addr)?;
                push(out, role)
            }
            Self::RemoteNameRequest(addr) => {
                write_bd_addr(out, addr)?;
                push(out, PAGE_SCAN_REPETITION_MODE_R1)?;
                // Reserved
                push(out, 0x00)?;
                // No clock offset
                out.extend_from_slice(&0u16.to_le_bytes())
            }
        }
    }
}

/// Encode a bt-hci command type, header included
fn write_cmd<C: WriteHci>(command: &C) -> Result<CommandPacket, WireShockError> {
    let mut buf = [0u8; MAX_COMMAND_PACKET_LENGTH];
    let size = command.size();
    if size > buf.len() {
        return Err(WireShockError::InvalidParameter);
    }
    command
        .write_hci(&mut buf[..])
        .map_err(|_| WireShockError::InvalidParameter)?;
    CommandPacket::from_slice(&buf[..size]).map_err(|()| WireShockError::InvalidParameter)
}

fn push(out: &mut CommandPacket, byte: u8) -> Result<(), ()> {
    out.push(byte).map_err(|_| ())
}

fn write_bd_addr(out: &mut CommandPacket, addr: BluetoothAddress) -> Result<(), ()> {
    let bd_addr: BdAddr = addr.into();
    out.extend_from_slice(bd_addr.raw())
}

/// Submission side of the outgoing command path
///
/// `issue` only enqueues: success means the command was accepted for
/// submission, not that the controller executed it.
pub trait CommandEncoder {
    /// Submit one command
    ///
    /// # Errors
    /// Returns `WireShockError::CommandIssue` if the command was not accepted.
    fn issue(&mut self, command: HciCommand) -> Result<(), WireShockError>;
}

/// [`CommandEncoder`] backed by an `embassy-sync` channel
pub struct ChannelEncoder<'a, M: RawMutex, const N: usize> {
    sender: Sender<'a, M, HciCommand, N>,
}

impl<'a, M: RawMutex, const N: usize> ChannelEncoder<'a, M, N> {
    /// Wrap the sending half of a command channel
    #[must_use]
    pub fn new(sender: Sender<'a, M, HciCommand, N>) -> Self {
        Self { sender }
    }
}

impl<M: RawMutex, const N: usize> CommandEncoder for ChannelEncoder<'_, M, N> {
    fn issue(&mut self, command: HciCommand) -> Result<(), WireShockError> {
        self.sender.try_send(command).map_err(|_| {
            warn!("[COMMAND] Queue full, dropping {:?}", command.opcode());
            WireShockError::CommandIssue(command.opcode())
        })?;
        trace!("[COMMAND] Queued {:?}", command.opcode());
        Ok(())
    }
}
