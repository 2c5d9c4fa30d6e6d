//! Controller bring-up
//!
//! Bring-up is a chain of single commands: each one is only issued once the
//! Command Complete of the previous one reported success. [`BringUpState`]
//! names the command whose completion is awaited, and the transition
//! functions map `(state, event)` to the next state, the next command and an
//! [`Effect`] the caller applies outside the controller context.
//!
//! The transition functions record what the events report into
//! [`ControllerContext`] but never issue anything themselves;
//! [`BringUp::commit`] issues the command and only advances the state when the
//! encoder accepted it, so a rejected submission leaves the chain stalled at
//! the step it was in.

use crate::{
    ControllerContext, WireShockError,
    command::{CommandEncoder, HciCommand, HciOpcode},
    constants::DUALSHOCK_4_VERSION,
    event::{CommandComplete, CommandStatus},
    status::CoreVersion,
};
use bt_hci::param::Status;

/// Position in the bring-up chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpState {
    /// Nothing issued yet
    #[default]
    Idle,
    /// Awaiting Reset
    Reset,
    /// Awaiting Read BD ADDR
    ReadBdAddr,
    /// Awaiting Read Buffer Size
    ReadBufferSize,
    /// Awaiting Read Local Version Information
    ReadLocalVersionInfo,
    /// Awaiting Write Simple Pairing Mode
    WriteSimplePairingMode,
    /// Awaiting Write Simple Pairing Debug Mode
    WriteSimplePairingDebugMode,
    /// Awaiting Write Authentication Enable
    WriteAuthenticationEnable,
    /// Awaiting Set Event Mask
    SetEventMask,
    /// Awaiting Write Page Timeout
    WritePageTimeout,
    /// Awaiting Write Page Scan Activity
    WritePageScanActivity,
    /// Awaiting Write Page Scan Type
    WritePageScanType,
    /// Awaiting Write Inquiry Scan Activity
    WriteInquiryScanActivity,
    /// Awaiting Write Inquiry Scan Type
    WriteInquiryScanType,
    /// Awaiting Write Inquiry Mode
    WriteInquiryMode,
    /// Awaiting Write Class of Device
    WriteClassOfDevice,
    /// Awaiting Write Extended Inquiry Response
    WriteExtendedInquiryResponse,
    /// Awaiting Write Local Name
    WriteLocalName,
    /// Awaiting Write Scan Enable
    WriteScanEnable,
    /// Chain complete, adapter initialized
    Ready,
}

impl BringUpState {
    /// Opcode whose completion this state waits for
    ///
    /// `Ready` still answers Write Scan Enable: a late duplicate completion
    /// marks the adapter initialized again, which is harmless.
    #[must_use]
    pub fn awaited(self) -> Option<HciOpcode> {
        match self {
            Self::Idle => None,
            Self::Reset => Some(HciOpcode::Reset),
            Self::ReadBdAddr => Some(HciOpcode::ReadBdAddr),
            Self::ReadBufferSize => Some(HciOpcode::ReadBufferSize),
            Self::ReadLocalVersionInfo => Some(HciOpcode::ReadLocalVersionInfo),
            Self::WriteSimplePairingMode => Some(HciOpcode::WriteSimplePairingMode),
            Self::WriteSimplePairingDebugMode => Some(HciOpcode::WriteSimplePairingDebugMode),
            Self::WriteAuthenticationEnable => Some(HciOpcode::WriteAuthenticationEnable),
            Self::SetEventMask => Some(HciOpcode::SetEventMask),
            Self::WritePageTimeout => Some(HciOpcode::WritePageTimeout),
            Self::WritePageScanActivity => Some(HciOpcode::WritePageScanActivity),
            Self::WritePageScanType => Some(HciOpcode::WritePageScanType),
            Self::WriteInquiryScanActivity => Some(HciOpcode::WriteInquiryScanActivity),
            Self::WriteInquiryScanType => Some(HciOpcode::WriteInquiryScanType),
            Self::WriteInquiryMode => Some(HciOpcode::WriteInquiryMode),
            Self::WriteClassOfDevice => Some(HciOpcode::WriteClassOfDevice),
            Self::WriteExtendedInquiryResponse => Some(HciOpcode::WriteExtendedInquiryResponse),
            Self::WriteLocalName => Some(HciOpcode::WriteLocalName),
            Self::WriteScanEnable | Self::Ready => Some(HciOpcode::WriteScanEnable),
        }
    }

    /// State entered once `command` has been issued
    #[must_use]
    pub fn awaiting(command: HciCommand) -> Self {
        match command {
            HciCommand::Reset => Self::Reset,
            HciCommand::ReadBdAddr => Self::ReadBdAddr,
            HciCommand::ReadBufferSize => Self::ReadBufferSize,
            HciCommand::ReadLocalVersionInfo => Self::ReadLocalVersionInfo,
            HciCommand::WriteSimplePairingMode => Self::WriteSimplePairingMode,
            HciCommand::WriteSimplePairingDebugMode => Self::WriteSimplePairingDebugMode,
            HciCommand::WriteAuthenticationEnable => Self::WriteAuthenticationEnable,
            HciCommand::SetEventMask => Self::SetEventMask,
            HciCommand::WritePageTimeout => Self::WritePageTimeout,
            HciCommand::WritePageScanActivity => Self::WritePageScanActivity,
            HciCommand::WritePageScanType => Self::WritePageScanType,
            HciCommand::WriteInquiryScanActivity => Self::WriteInquiryScanActivity,
            HciCommand::WriteInquiryScanType => Self::WriteInquiryScanType,
            HciCommand::WriteInquiryMode => Self::WriteInquiryMode,
            HciCommand::WriteClassOfDevice => Self::WriteClassOfDevice,
            HciCommand::WriteExtendedInquiryResponse => Self::WriteExtendedInquiryResponse,
            HciCommand::WriteLocalName => Self::WriteLocalName,
            HciCommand::WriteScanEnable => Self::WriteScanEnable,
            // Lifecycle commands are not part of the chain
            HciCommand::DeleteStoredLinkKey(_)
            | HciCommand::AcceptConnectionRequest { .. }
            | HciCommand::RemoteNameRequest(_) => Self::Ready,
        }
    }

    /// Whether this state is one of the SSP-only steps that demote on failure
    fn is_ssp_step(self) -> bool {
        matches!(
            self,
            Self::WriteSimplePairingMode | Self::WriteAuthenticationEnable | Self::SetEventMask
        )
    }
}

/// Side effect of a transition that lives outside the controller context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    /// Nothing to do
    None,
    /// The controller forgot every link: drop all known children
    PurgeChildren,
    /// The controller was rejected: restart bring-up from Reset
    Restart,
}

/// Result of one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    /// State to enter once `issue` was accepted
    pub next: BringUpState,
    /// Command to issue, if any
    pub issue: Option<HciCommand>,
    /// Effect to apply before committing
    pub effect: Effect,
}

impl Transition {
    fn stay(state: BringUpState) -> Self {
        Self {
            next: state,
            issue: None,
            effect: Effect::None,
        }
    }

    fn issue(command: HciCommand) -> Self {
        Self {
            next: BringUpState::awaiting(command),
            issue: Some(command),
            effect: Effect::None,
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }
}

/// Bring-up state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringUp {
    state: BringUpState,
    min_hci_version: CoreVersion,
    min_lmp_version: CoreVersion,
}

impl BringUp {
    /// Create an idle state machine gating on the given minimum versions
    #[must_use]
    pub fn new(min_hci_version: u8, min_lmp_version: u8) -> Self {
        Self {
            state: BringUpState::Idle,
            min_hci_version: CoreVersion(min_hci_version),
            min_lmp_version: CoreVersion(min_lmp_version),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> BringUpState {
        self.state
    }

    /// Transition issuing the initial Reset
    #[must_use]
    pub fn start(&self) -> Transition {
        Transition::issue(HciCommand::Reset)
    }

    /// Transition issuing a Reset that also forgets bring-up progress
    #[must_use]
    pub fn restart(&self) -> Transition {
        Transition::issue(HciCommand::Reset).with_effect(Effect::Restart)
    }

    /// Transition for a Command Complete event
    pub fn on_command_complete(
        &self,
        ctx: &mut ControllerContext,
        complete: &CommandComplete<'_>,
    ) -> Transition {
        let Some(opcode) = complete.command() else {
            debug!(
                "[BRINGUP] Ignoring completion of unknown opcode 0x{:04X}",
                complete.opcode
            );
            return Transition::stay(self.state);
        };

        if self.state.awaited() != Some(opcode) {
            debug!(
                "[BRINGUP] Ignoring completion of {:?} while in {:?}",
                opcode, self.state
            );
            return Transition::stay(self.state);
        }

        if !complete.is_success() {
            return self.on_failure(ctx, opcode, complete.status);
        }

        match self.state {
            BringUpState::Idle => Transition::stay(self.state),
            BringUpState::Reset => {
                if ctx.started() {
                    debug!("[BRINGUP] Reset completed again, already started");
                    return Transition::stay(self.state);
                }
                info!("[BRINGUP] Controller reset");
                ctx.mark_started();
                Transition::issue(HciCommand::ReadBdAddr).with_effect(Effect::PurgeChildren)
            }
            BringUpState::ReadBdAddr => {
                let Some(addr) = complete.bd_addr() else {
                    warn!("[BRINGUP] Read BD ADDR result too short");
                    return Transition::stay(self.state);
                };
                info!("[BRINGUP] Host address {}", addr.format_hex());
                ctx.set_host_address(addr);
                Transition::issue(HciCommand::ReadBufferSize)
            }
            BringUpState::ReadBufferSize => {
                let Some(buffer_size) = complete.buffer_size() else {
                    warn!("[BRINGUP] Read Buffer Size result too short");
                    return Transition::stay(self.state);
                };
                debug!(
                    "[BRINGUP] ACL {} x {} bytes, SCO {} x {} bytes",
                    buffer_size.total_num_acl_data_packets,
                    buffer_size.acl_data_packet_length,
                    buffer_size.total_num_sco_data_packets,
                    buffer_size.sco_data_packet_length
                );
                ctx.set_buffer_size(buffer_size);
                Transition::issue(HciCommand::ReadLocalVersionInfo)
            }
            BringUpState::ReadLocalVersionInfo => self.on_local_version(ctx, complete),
            BringUpState::WriteSimplePairingMode => {
                Transition::issue(HciCommand::WriteSimplePairingDebugMode)
            }
            BringUpState::WriteSimplePairingDebugMode => {
                Transition::issue(HciCommand::WriteAuthenticationEnable)
            }
            BringUpState::WriteAuthenticationEnable => Transition::issue(HciCommand::SetEventMask),
            BringUpState::SetEventMask => Transition::issue(HciCommand::WritePageTimeout),
            BringUpState::WritePageTimeout => Transition::issue(HciCommand::WritePageScanActivity),
            BringUpState::WritePageScanActivity => {
                Transition::issue(HciCommand::WritePageScanType)
            }
            BringUpState::WritePageScanType => {
                Transition::issue(HciCommand::WriteInquiryScanActivity)
            }
            BringUpState::WriteInquiryScanActivity => {
                Transition::issue(HciCommand::WriteInquiryScanType)
            }
            BringUpState::WriteInquiryScanType => Transition::issue(HciCommand::WriteInquiryMode),
            BringUpState::WriteInquiryMode => Transition::issue(HciCommand::WriteClassOfDevice),
            BringUpState::WriteClassOfDevice => {
                Transition::issue(HciCommand::WriteExtendedInquiryResponse)
            }
            BringUpState::WriteExtendedInquiryResponse => {
                Transition::issue(HciCommand::WriteLocalName)
            }
            BringUpState::WriteLocalName => Transition::issue(HciCommand::WriteScanEnable),
            BringUpState::WriteScanEnable | BringUpState::Ready => {
                info!("[BRINGUP] Adapter initialized");
                ctx.mark_initialized();
                Transition::stay(BringUpState::Ready)
            }
        }
    }

    /// Transition for a Command Status event
    ///
    /// Only a failure of the awaited SSP step changes anything; it demotes the
    /// adapter exactly like the failed Command Complete would.
    pub fn on_command_status(
        &self,
        ctx: &mut ControllerContext,
        status: &CommandStatus,
    ) -> Transition {
        if status.status.to_result().is_ok() {
            trace!(
                "[BRINGUP] Command 0x{:04X} pending, {} packets allowed",
                status.opcode, status.num_hci_command_packets
            );
            return Transition::stay(self.state);
        }

        match status.command() {
            Some(opcode) if self.state.awaited() == Some(opcode) && self.state.is_ssp_step() => {
                self.on_failure(ctx, opcode, status.status)
            }
            _ => {
                warn!(
                    "[BRINGUP] Command 0x{:04X} rejected: {:?}",
                    status.opcode, status.status
                );
                Transition::stay(self.state)
            }
        }
    }

    /// Issue the transition's command and enter its next state
    ///
    /// A rejected command leaves the state untouched. A restart only clears
    /// `started` once its Reset was accepted.
    ///
    /// # Errors
    /// Returns the encoder's error if the command was not accepted.
    pub fn commit<E: CommandEncoder>(
        &mut self,
        ctx: &mut ControllerContext,
        transition: Transition,
        encoder: &mut E,
    ) -> Result<(), WireShockError> {
        if let Some(command) = transition.issue {
            if let Err(err) = encoder.issue(command) {
                error!(
                    "[BRINGUP] Failed to issue {:?}, stalled in {:?}",
                    command.opcode(),
                    self.state
                );
                return Err(err);
            }
        }
        if transition.effect == Effect::Restart {
            ctx.restart();
        }
        self.state = transition.next;
        Ok(())
    }

    fn on_local_version(
        &self,
        ctx: &mut ControllerContext,
        complete: &CommandComplete<'_>,
    ) -> Transition {
        let Some(version) = complete.local_version() else {
            warn!("[BRINGUP] Read Local Version Information result too short");
            return Transition::stay(self.state);
        };
        ctx.set_local_version(version);

        info!(
            "[BRINGUP] HCI version {}: {:?}",
            version.hci_version.raw(),
            version.hci_version.specification()
        );
        info!(
            "[BRINGUP] LMP version {}: {:?}",
            version.lmp_version.raw(),
            version.lmp_version.specification()
        );

        if version.hci_version < self.min_hci_version || version.lmp_version < self.min_lmp_version
        {
            error!("[BRINGUP] Controller too old for any supported controller, restarting");
            return Transition::issue(HciCommand::Reset).with_effect(Effect::Restart);
        }

        info!("[BRINGUP] DualShock 3 capable");
        let ds4 = CoreVersion(DUALSHOCK_4_VERSION);
        if version.hci_version >= ds4 && version.lmp_version >= ds4 {
            info!("[BRINGUP] DualShock 4 capable");
        }

        if ctx.disable_ssp() {
            debug!("[BRINGUP] SSP disabled, skipping SSP setup");
            Transition::issue(HciCommand::WriteScanEnable)
        } else {
            Transition::issue(HciCommand::WriteSimplePairingMode)
        }
    }

    fn on_failure(
        &self,
        ctx: &mut ControllerContext,
        opcode: HciOpcode,
        status: Status,
    ) -> Transition {
        match self.state {
            // Debug mode is best-effort
            BringUpState::WriteSimplePairingDebugMode => {
                debug!("[BRINGUP] Simple pairing debug mode not set: {:?}", status);
                Transition::issue(HciCommand::WriteAuthenticationEnable)
            }
            state if state.is_ssp_step() => {
                warn!("[BRINGUP] {:?} failed: {:?}, disabling SSP", opcode, status);
                ctx.demote_ssp();
                Transition::issue(HciCommand::WriteScanEnable)
            }
            _ => {
                error!("[BRINGUP] {:?} failed: {:?}, stalled", opcode, status);
                Transition::stay(self.state)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BluetoothAddress, event::CommandComplete};
    use std::vec::Vec;

    #[derive(Default)]
    struct Recorder {
        issued: Vec<HciCommand>,
        reject: bool,
    }

    impl CommandEncoder for Recorder {
        fn issue(&mut self, command: HciCommand) -> Result<(), WireShockError> {
            if self.reject {
                return Err(WireShockError::CommandIssue(command.opcode()));
            }
            self.issued.push(command);
            Ok(())
        }
    }

    const BD_ADDR_RESULT: [u8; 7] = [0x00, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11];
    const BUFFER_SIZE_RESULT: [u8; 8] = [0x00, 0xFD, 0x03, 0x40, 0x08, 0x00, 0x01, 0x00];

    fn version_result(hci: u8, lmp: u8) -> [u8; 9] {
        [0x00, hci, 0x00, 0x10, lmp, 0x0F, 0x00, 0x34, 0x12]
    }

    /// Command Complete whose first byte is the status
    fn complete(opcode: HciOpcode, parameters: &[u8]) -> CommandComplete<'_> {
        CommandComplete {
            num_hci_command_packets: 1,
            opcode: opcode.raw(),
            status: Status::new(parameters[0]),
            return_parameters: &parameters[1..],
        }
    }

    fn success(opcode: HciOpcode) -> CommandComplete<'static> {
        complete(opcode, &[0x00])
    }

    fn step(
        machine: &mut BringUp,
        ctx: &mut ControllerContext,
        encoder: &mut Recorder,
        event: &CommandComplete<'_>,
    ) -> Transition {
        let transition = machine.on_command_complete(ctx, event);
        machine.commit(ctx, transition, encoder).unwrap();
        transition
    }

    fn started(encoder: &mut Recorder, ctx: &mut ControllerContext) -> BringUp {
        let mut machine = BringUp::new(3, 3);
        let transition = machine.start();
        machine.commit(ctx, transition, encoder).unwrap();
        machine
    }

    /// Drive the chain up to the Read Local Version Information completion
    fn through_version(
        machine: &mut BringUp,
        ctx: &mut ControllerContext,
        encoder: &mut Recorder,
        hci: u8,
        lmp: u8,
    ) -> Transition {
        step(machine, ctx, encoder, &success(HciOpcode::Reset));
        step(machine, ctx, encoder, &complete(HciOpcode::ReadBdAddr, &BD_ADDR_RESULT));
        step(machine, ctx, encoder, &complete(HciOpcode::ReadBufferSize, &BUFFER_SIZE_RESULT));
        let version = version_result(hci, lmp);
        step(machine, ctx, encoder, &complete(HciOpcode::ReadLocalVersionInfo, &version))
    }

    #[test]
    fn test_full_chain_reaches_initialized() {
        let mut encoder = Recorder::default();
        let mut ctx = ControllerContext::default();
        let mut machine = started(&mut encoder, &mut ctx);
        let mut completions = 0;

        let first = step(&mut machine, &mut ctx, &mut encoder, &success(HciOpcode::Reset));
        completions += 1;
        assert_eq!(first.effect, Effect::PurgeChildren);
        assert!(ctx.started());

        step(&mut machine, &mut ctx, &mut encoder, &complete(HciOpcode::ReadBdAddr, &BD_ADDR_RESULT));
        step(
            &mut machine,
            &mut ctx,
            &mut encoder,
            &complete(HciOpcode::ReadBufferSize, &BUFFER_SIZE_RESULT),
        );
        let version = version_result(6, 6);
        step(
            &mut machine,
            &mut ctx,
            &mut encoder,
            &complete(HciOpcode::ReadLocalVersionInfo, &version),
        );
        completions += 3;

        while machine.state() != BringUpState::Ready {
            let Some(opcode) = machine.state().awaited() else {
                panic!("chain stalled in {:?}", machine.state());
            };
            step(&mut machine, &mut ctx, &mut encoder, &success(opcode));
            completions += 1;
        }

        assert_eq!(completions, 18);
        assert!(ctx.initialized());
        assert!(!ctx.disable_ssp());
        assert_eq!(
            ctx.host_address(),
            Some(BluetoothAddress::new([0x66, 0x55, 0x44, 0x33, 0x22, 0x11]))
        );
        assert_eq!(ctx.hci_version(), Some(CoreVersion(6)));
        assert_eq!(ctx.buffer_size().map(|size| size.acl_data_packet_length), Some(1021));
        assert_eq!(
            encoder.issued,
            [
                HciCommand::Reset,
                HciCommand::ReadBdAddr,
                HciCommand::ReadBufferSize,
                HciCommand::ReadLocalVersionInfo,
                HciCommand::WriteSimplePairingMode,
                HciCommand::WriteSimplePairingDebugMode,
                HciCommand::WriteAuthenticationEnable,
                HciCommand::SetEventMask,
                HciCommand::WritePageTimeout,
                HciCommand::WritePageScanActivity,
                HciCommand::WritePageScanType,
                HciCommand::WriteInquiryScanActivity,
                HciCommand::WriteInquiryScanType,
                HciCommand::WriteInquiryMode,
                HciCommand::WriteClassOfDevice,
                HciCommand::WriteExtendedInquiryResponse,
                HciCommand::WriteLocalName,
                HciCommand::WriteScanEnable,
            ]
        );

        // A duplicate Write Scan Enable completion is harmless
        step(&mut machine, &mut ctx, &mut encoder, &success(HciOpcode::WriteScanEnable));
        assert_eq!(machine.state(), BringUpState::Ready);
        assert!(ctx.initialized());
        assert_eq!(encoder.issued.len(), 18);
    }

    #[test]
    fn test_simple_pairing_failure_skips_to_scan_enable() {
        let mut encoder = Recorder::default();
        let mut ctx = ControllerContext::default();
        let mut machine = started(&mut encoder, &mut ctx);
        through_version(&mut machine, &mut ctx, &mut encoder, 4, 4);

        step(
            &mut machine,
            &mut ctx,
            &mut encoder,
            &complete(HciOpcode::WriteSimplePairingMode, &[0x11]),
        );
        assert!(ctx.disable_ssp());
        assert_eq!(encoder.issued.last(), Some(&HciCommand::WriteScanEnable));
        assert_eq!(machine.state(), BringUpState::WriteScanEnable);

        step(&mut machine, &mut ctx, &mut encoder, &success(HciOpcode::WriteScanEnable));
        assert!(ctx.initialized());
        assert!(!encoder.issued.contains(&HciCommand::WriteSimplePairingDebugMode));
        assert!(!encoder.issued.contains(&HciCommand::WriteAuthenticationEnable));
        assert!(!encoder.issued.contains(&HciCommand::SetEventMask));
    }

    #[test]
    fn test_authentication_and_event_mask_failures_demote() {
        for failing in [HciOpcode::WriteAuthenticationEnable, HciOpcode::SetEventMask] {
            let mut encoder = Recorder::default();
            let mut ctx = ControllerContext::default();
            let mut machine = started(&mut encoder, &mut ctx);
            through_version(&mut machine, &mut ctx, &mut encoder, 4, 4);

            while machine.state().awaited() != Some(failing) {
                let opcode = machine.state().awaited().unwrap();
                step(&mut machine, &mut ctx, &mut encoder, &success(opcode));
            }
            step(&mut machine, &mut ctx, &mut encoder, &complete(failing, &[0x01]));

            assert!(ctx.disable_ssp());
            assert_eq!(machine.state(), BringUpState::WriteScanEnable);
            assert_eq!(encoder.issued.last(), Some(&HciCommand::WriteScanEnable));
        }
    }

    #[test]
    fn test_debug_mode_status_is_not_checked() {
        let mut encoder = Recorder::default();
        let mut ctx = ControllerContext::default();
        let mut machine = started(&mut encoder, &mut ctx);
        through_version(&mut machine, &mut ctx, &mut encoder, 4, 4);
        step(&mut machine, &mut ctx, &mut encoder, &success(HciOpcode::WriteSimplePairingMode));

        step(
            &mut machine,
            &mut ctx,
            &mut encoder,
            &complete(HciOpcode::WriteSimplePairingDebugMode, &[0x0C]),
        );
        assert_eq!(machine.state(), BringUpState::WriteAuthenticationEnable);
        assert!(!ctx.disable_ssp());
    }

    #[test]
    fn test_old_controller_restarts() {
        let mut encoder = Recorder::default();
        let mut ctx = ControllerContext::default();
        let mut machine = started(&mut encoder, &mut ctx);
        let transition = through_version(&mut machine, &mut ctx, &mut encoder, 2, 6);

        assert_eq!(transition.effect, Effect::Restart);
        assert_eq!(encoder.issued.last(), Some(&HciCommand::Reset));
        assert_eq!(machine.state(), BringUpState::Reset);
        assert!(!ctx.started());
        assert!(!ctx.initialized());
    }

    #[test]
    fn test_disabled_ssp_survives_restart() {
        let mut encoder = Recorder::default();
        let mut ctx = ControllerContext::default();
        let mut machine = started(&mut encoder, &mut ctx);
        through_version(&mut machine, &mut ctx, &mut encoder, 4, 4);
        step(
            &mut machine,
            &mut ctx,
            &mut encoder,
            &complete(HciOpcode::WriteSimplePairingMode, &[0x11]),
        );
        assert!(ctx.disable_ssp());

        // The controller now reports an old LMP version and bring-up restarts
        machine = BringUp::new(3, 5);
        let transition = machine.start();
        machine.commit(&mut ctx, transition, &mut encoder).unwrap();
        ctx.restart();
        through_version(&mut machine, &mut ctx, &mut encoder, 4, 4);
        assert!(ctx.disable_ssp());

        // Second pass with an acceptable controller takes the SSP shortcut
        let mut machine = BringUp::new(3, 3);
        let transition = machine.start();
        machine.commit(&mut ctx, transition, &mut encoder).unwrap();
        ctx.restart();
        through_version(&mut machine, &mut ctx, &mut encoder, 4, 4);
        assert!(ctx.disable_ssp());
        assert_eq!(encoder.issued.last(), Some(&HciCommand::WriteScanEnable));
    }

    #[test]
    fn test_command_status_failure_demotes_awaited_ssp_step() {
        let mut encoder = Recorder::default();
        let mut ctx = ControllerContext::default();
        let mut machine = started(&mut encoder, &mut ctx);
        through_version(&mut machine, &mut ctx, &mut encoder, 4, 4);

        let status = CommandStatus {
            status: Status::new(0x01),
            num_hci_command_packets: 1,
            opcode: HciOpcode::WriteSimplePairingMode.raw(),
        };
        let transition = machine.on_command_status(&mut ctx, &status);
        machine.commit(&mut ctx, transition, &mut encoder).unwrap();

        assert!(ctx.disable_ssp());
        assert_eq!(machine.state(), BringUpState::WriteScanEnable);

        // Failures of commands outside the chain change nothing
        let other = CommandStatus {
            status: Status::new(0x0C),
            num_hci_command_packets: 1,
            opcode: HciOpcode::AcceptConnectionRequest.raw(),
        };
        assert_eq!(
            machine.on_command_status(&mut ctx, &other),
            Transition::stay(BringUpState::WriteScanEnable)
        );
    }

    #[test]
    fn test_rejected_issue_stalls() {
        let mut encoder = Recorder::default();
        let mut ctx = ControllerContext::default();
        let mut machine = started(&mut encoder, &mut ctx);

        encoder.reject = true;
        let transition = machine.on_command_complete(&mut ctx, &success(HciOpcode::Reset));
        assert_eq!(
            machine.commit(&mut ctx, transition, &mut encoder),
            Err(WireShockError::CommandIssue(HciOpcode::ReadBdAddr))
        );
        assert_eq!(machine.state(), BringUpState::Reset);
    }

    #[test]
    fn test_out_of_order_completions_are_ignored() {
        let mut encoder = Recorder::default();
        let mut ctx = ControllerContext::default();
        let mut machine = started(&mut encoder, &mut ctx);

        let transition =
            machine.on_command_complete(&mut ctx, &complete(HciOpcode::ReadBdAddr, &BD_ADDR_RESULT));
        assert_eq!(transition, Transition::stay(BringUpState::Reset));
        assert_eq!(ctx.host_address(), None);

        // A failed step other than the SSP ones stalls
        step(&mut machine, &mut ctx, &mut encoder, &success(HciOpcode::Reset));
        let transition =
            machine.on_command_complete(&mut ctx, &complete(HciOpcode::ReadBdAddr, &[0x03]));
        assert_eq!(transition, Transition::stay(BringUpState::ReadBdAddr));
    }

    #[test]
    fn test_repeated_reset_does_not_purge_twice() {
        let mut encoder = Recorder::default();
        let mut ctx = ControllerContext::default();
        let mut machine = started(&mut encoder, &mut ctx);
        step(&mut machine, &mut ctx, &mut encoder, &success(HciOpcode::Reset));

        let mut machine = BringUp::new(3, 3);
        let transition = machine.start();
        machine.commit(&mut ctx, transition, &mut encoder).unwrap();
        let transition = machine.on_command_complete(&mut ctx, &success(HciOpcode::Reset));
        assert_eq!(transition, Transition::stay(BringUpState::Reset));
    }
}
