//! Adapter entry points
//!
//! [`Adapter`] owns the controller context, the bring-up state machine, the
//! lifecycle coordinator, the command encoder and the child registry. Every
//! event is handled inside one critical section of an `embassy-sync`
//! blocking mutex, so transfers completing on different reader slots never
//! interleave. Nothing in here blocks: commands are only enqueued.

use crate::{
    AdapterOptions, BluetoothAddress, ControllerContext, WireShockError,
    bring_up::{BringUp, BringUpState, Effect, Transition},
    command::CommandEncoder,
    device::RemoteDevice,
    event::{HciEvent, RawEvent},
    lifecycle::Coordinator,
    registry::DeviceRegistry,
    transport::ReadFailure,
};
use core::{
    cell::RefCell,
    sync::atomic::{AtomicBool, Ordering},
};
use embassy_sync::blocking_mutex::{Mutex, raw::RawMutex};

struct AdapterCore<E, R> {
    context: ControllerContext,
    bring_up: BringUp,
    coordinator: Coordinator,
    encoder: E,
    registry: R,
    options: AdapterOptions,
    last_error: Option<WireShockError>,
}

impl<E: CommandEncoder, R: DeviceRegistry> AdapterCore<E, R> {
    fn dispatch(&mut self, event: &HciEvent<'_>) -> Result<(), WireShockError> {
        match event {
            HciEvent::CommandComplete(complete) => {
                let transition = self
                    .bring_up
                    .on_command_complete(&mut self.context, complete);
                self.apply(transition)
            }
            HciEvent::CommandStatus(status) => {
                let transition = self.bring_up.on_command_status(&mut self.context, status);
                self.apply(transition)
            }
            HciEvent::ConnectionRequest(request) => self.coordinator.on_connection_request(
                request,
                self.options.accept_role,
                &mut self.registry,
                &mut self.encoder,
            ),
            HciEvent::ConnectionComplete(complete) => {
                self.coordinator
                    .on_connection_complete(complete, &mut self.registry, &mut self.encoder)
            }
            HciEvent::DisconnectionComplete(complete) => self
                .coordinator
                .on_disconnection_complete(complete, &mut self.registry),
            HciEvent::RemoteNameRequestComplete(complete) => {
                self.coordinator.on_remote_name(complete, &mut self.registry)
            }
            HciEvent::RoleChange(change) => {
                self.coordinator.on_role_change(change);
                Ok(())
            }
            HciEvent::PageScanRepetitionModeChange(change) => {
                self.coordinator.on_page_scan_repetition_mode_change(change);
                Ok(())
            }
            HciEvent::NumberOfCompletedPackets => {
                trace!("[ADAPTER] Number of completed packets, not handled");
                Ok(())
            }
            HciEvent::Pairing { code, bd_addr } => {
                debug!(
                    "[ADAPTER] {:?} from {}, not handled",
                    code,
                    bd_addr.format_hex()
                );
                Ok(())
            }
            HciEvent::Unknown(code) => {
                warn!("[ADAPTER] Unhandled event 0x{:02X}", code);
                Ok(())
            }
        }
    }

    fn apply(&mut self, transition: Transition) -> Result<(), WireShockError> {
        if transition.effect == Effect::PurgeChildren {
            debug!("[ADAPTER] Purging {} children", self.coordinator.len());
            self.coordinator.clear();
            self.registry.purge_all();
        }
        self.bring_up
            .commit(&mut self.context, transition, &mut self.encoder)
    }

    fn record(&mut self, result: Result<(), WireShockError>) -> Result<(), WireShockError> {
        if let Err(err) = result {
            error!("[ADAPTER] Event handling failed: {:?}", err);
            self.last_error = Some(err);
        }
        result
    }
}

/// One Bluetooth adapter
pub struct Adapter<M: RawMutex, E, R> {
    alive: AtomicBool,
    options: AdapterOptions,
    core: Mutex<M, RefCell<AdapterCore<E, R>>>,
}

impl<M: RawMutex, E: CommandEncoder, R: DeviceRegistry> Adapter<M, E, R> {
    /// Create an adapter; nothing is issued until [`Adapter::start`]
    pub fn new(encoder: E, registry: R, options: AdapterOptions) -> Self {
        Self {
            alive: AtomicBool::new(true),
            options,
            core: Mutex::new(RefCell::new(AdapterCore {
                context: ControllerContext::default(),
                bring_up: BringUp::new(options.min_hci_version, options.min_lmp_version),
                coordinator: Coordinator::new(),
                encoder,
                registry,
                options,
                last_error: None,
            })),
        }
    }

    fn with_core<T>(
        &self,
        f: impl FnOnce(&mut AdapterCore<E, R>) -> T,
    ) -> Result<T, WireShockError> {
        self.core.lock(|cell| {
            // Only a reentrant call from inside an encoder or registry can fail here
            let mut core = cell.try_borrow_mut().map_err(|_| {
                error!("[ADAPTER] Reentrant access");
                WireShockError::Busy
            })?;
            Ok(f(&mut *core))
        })
    }

    /// Issue the initial Reset
    ///
    /// # Errors
    /// Returns the command-issue failure; bring-up stays idle.
    pub fn start(&self) -> Result<(), WireShockError> {
        info!("[ADAPTER] Starting bring-up");
        self.with_core(|core| {
            let transition = core.bring_up.start();
            let result = core.apply(transition);
            core.record(result)
        })?
    }

    /// Full reset cycle: forget bring-up progress and issue Reset
    ///
    /// Children are purged once the Reset completes. The controller context is
    /// only reset once the Reset was accepted for submission.
    ///
    /// # Errors
    /// Returns the command-issue failure; the context is left untouched.
    pub fn restart(&self) -> Result<(), WireShockError> {
        info!("[ADAPTER] Restarting bring-up");
        self.with_core(|core| {
            let transition = core.bring_up.restart();
            let result = core.apply(transition);
            core.record(result)
        })?
    }

    /// Stop processing; every later event is dropped
    pub fn teardown(&self) {
        info!("[ADAPTER] Teardown");
        self.alive.store(false, Ordering::Release);
    }

    /// Whether the adapter still processes events
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Handle one transfer from the interrupt endpoint
    ///
    /// Never fails: empty and malformed transfers are logged and dropped, and
    /// handling errors are logged and kept as [`Adapter::last_error`].
    pub fn handle_event_buffer(&self, buffer: &[u8]) {
        if !self.is_alive() {
            debug!("[ADAPTER] Adapter torn down, dropping event");
            return;
        }

        let Some(raw) = RawEvent::decode(buffer) else {
            warn!("[DECODER] Zero-length transfer");
            return;
        };
        trace!("[DECODER] Event 0x{:02X}, {} bytes", raw.code, raw.len());

        let event = match HciEvent::parse(&raw) {
            Ok(event) => event,
            Err(err) => {
                warn!("[DECODER] Dropping event: {:?}", err);
                return;
            }
        };

        // The result is already logged and recorded
        let _ = self.with_core(|core| {
            let result = core.dispatch(&event);
            core.record(result)
        });
    }

    /// Handle a failed interrupt read; returns whether to keep reading
    pub fn handle_read_failure(&self, failure: ReadFailure) -> bool {
        warn!(
            "[ADAPTER] Interrupt read failed: status 0x{:08X}, USBD status 0x{:08X}",
            failure.status, failure.usbd_status
        );
        true
    }

    /// Options the adapter was created with
    pub fn options(&self) -> AdapterOptions {
        self.options
    }

    /// Whether bring-up completed
    pub fn is_initialized(&self) -> bool {
        self.context().initialized()
    }

    /// Snapshot of the controller context
    pub fn context(&self) -> ControllerContext {
        self.with_core(|core| core.context).unwrap_or_default()
    }

    /// Current bring-up state
    pub fn bring_up_state(&self) -> BringUpState {
        self.with_core(|core| core.bring_up.state())
            .unwrap_or_default()
    }

    /// Most recent handling error
    pub fn last_error(&self) -> Option<WireShockError> {
        self.with_core(|core| core.last_error).ok().flatten()
    }

    /// Snapshot of a known remote device
    pub fn remote_device(&self, address: &BluetoothAddress) -> Option<RemoteDevice> {
        self.with_core(|core| core.coordinator.remote_device(address).cloned())
            .ok()
            .flatten()
    }

    /// Run `f` on the registry
    ///
    /// # Errors
    /// Fails only when called reentrantly from the registry or encoder.
    pub fn with_registry<T>(&self, f: impl FnOnce(&mut R) -> T) -> Result<T, WireShockError> {
        self.with_core(|core| f(&mut core.registry))
    }

    /// Run `f` on the command encoder
    ///
    /// # Errors
    /// Fails only when called reentrantly from the registry or encoder.
    pub fn with_encoder<T>(&self, f: impl FnOnce(&mut E) -> T) -> Result<T, WireShockError> {
        self.with_core(|core| f(&mut core.encoder))
    }
}
