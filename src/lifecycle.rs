//! Connection lifecycle
//!
//! Follows each remote controller from its Connection Request to its
//! Disconnection Complete: accept the link, bind the handle, read the remote
//! name, classify, hand over to the output report path, and finally drop the
//! child. Records are keyed by address and mirrored into a [`DeviceRegistry`].

use crate::{
    BluetoothAddress, WireShockError,
    command::{CommandEncoder, HciCommand},
    constants::{MAX_REMOTE_DEVICES, ROLE_MASTER},
    device::{DeviceType, RemoteDevice},
    event::{
        ConnectionComplete, ConnectionRequest, DisconnectionComplete,
        PageScanRepetitionModeChange, RemoteNameRequestComplete, RoleChange,
    },
    registry::DeviceRegistry,
};
use heapless::FnvIndexMap;

/// Connection lifecycle coordinator
#[derive(Debug, Default)]
pub struct Coordinator {
    devices: FnvIndexMap<BluetoothAddress, RemoteDevice, MAX_REMOTE_DEVICES>,
}

impl Coordinator {
    /// Create a coordinator without any known peer
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: FnvIndexMap::new(),
        }
    }

    /// Record of a known peer
    #[must_use]
    pub fn remote_device(&self, address: &BluetoothAddress) -> Option<&RemoteDevice> {
        self.devices.get(address)
    }

    /// Number of known peers
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no peer is known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Forget every peer
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Register the peer, clear its stored link key and accept the link
    ///
    /// The coordinator record and the registry child are added together: when
    /// either side is full, neither keeps the peer.
    ///
    /// # Errors
    /// The first capacity, registry or command-issue failure aborts the event.
    pub fn on_connection_request<R: DeviceRegistry, E: CommandEncoder>(
        &mut self,
        request: &ConnectionRequest,
        role: u8,
        registry: &mut R,
        encoder: &mut E,
    ) -> Result<(), WireShockError> {
        let addr = request.bd_addr;
        info!(
            "[LIFECYCLE] Connection request from {}, link type 0x{:02X}",
            addr.format_hex(),
            request.link_type
        );

        let fresh = !self.devices.contains_key(&addr);
        if fresh {
            self.devices
                .insert(addr, RemoteDevice::new(addr))
                .map_err(|_| {
                    warn!("[LIFECYCLE] No room to track {}", addr.format_hex());
                    WireShockError::CapacityExceeded
                })?;
        }
        if let Err(err) = registry.add_or_update_present(addr) {
            if fresh {
                self.devices.remove(&addr);
            }
            return Err(err.into());
        }

        encoder.issue(HciCommand::DeleteStoredLinkKey(addr))?;
        encoder.issue(HciCommand::AcceptConnectionRequest {
            bd_addr: addr,
            role,
        })?;

        debug!(
            "[LIFECYCLE] Accepting {} as {}",
            addr.format_hex(),
            if role == ROLE_MASTER { "master" } else { "slave" }
        );
        Ok(())
    }

    /// Bind the handle of an established link and ask for the peer's name
    ///
    /// A failed connection attempt is only logged; the peer may retry. A peer
    /// that never sent a Connection Request is ignored.
    ///
    /// # Errors
    /// Returns the registry or command-issue failure.
    pub fn on_connection_complete<R: DeviceRegistry, E: CommandEncoder>(
        &mut self,
        complete: &ConnectionComplete,
        registry: &mut R,
        encoder: &mut E,
    ) -> Result<(), WireShockError> {
        let addr = complete.bd_addr;
        if let Err(err) = complete.status.to_result() {
            warn!(
                "[LIFECYCLE] Connection with {} failed: {:?}",
                addr.format_hex(),
                err
            );
            return Ok(());
        }

        let Some(device) = self.devices.get_mut(&addr) else {
            warn!(
                "[LIFECYCLE] Ignoring connection of unrequested peer {}",
                addr.format_hex()
            );
            return Ok(());
        };

        info!(
            "[LIFECYCLE] Connected to {}, handle 0x{:04X}",
            addr.format_hex(),
            complete.handle.raw()
        );

        device.set_connection_handle(complete.handle);
        registry.bind_handle(addr, complete.handle)?;
        encoder.issue(HciCommand::RemoteNameRequest(addr))
    }

    /// Drop the child owning the closed link
    ///
    /// A handle that was never bound is ignored.
    ///
    /// # Errors
    /// Returns the registry failure.
    pub fn on_disconnection_complete<R: DeviceRegistry>(
        &mut self,
        complete: &DisconnectionComplete,
        registry: &mut R,
    ) -> Result<(), WireShockError> {
        if let Err(err) = complete.status.to_result() {
            warn!(
                "[LIFECYCLE] Disconnection of handle 0x{:04X} failed: {:?}",
                complete.handle.raw(),
                err
            );
            return Ok(());
        }

        let Some(addr) = registry.lookup_by_handle(complete.handle) else {
            debug!(
                "[LIFECYCLE] Disconnection of unknown handle 0x{:04X}",
                complete.handle.raw()
            );
            return Ok(());
        };

        info!(
            "[LIFECYCLE] Disconnected from {}: {:?}",
            addr.format_hex(),
            complete.reason
        );

        self.devices.remove(&addr);
        registry.mark_missing(addr)?;
        Ok(())
    }

    /// Store the remote name, classify the controller and set up its output report
    ///
    /// An empty name leaves the device unclassified. A name for a peer that
    /// never sent a Connection Request is ignored.
    ///
    /// # Errors
    /// Returns a registry failure while storing the name or type. A failure to
    /// set up the output report is only logged.
    pub fn on_remote_name<R: DeviceRegistry>(
        &mut self,
        complete: &RemoteNameRequestComplete<'_>,
        registry: &mut R,
    ) -> Result<(), WireShockError> {
        let addr = complete.bd_addr;
        if let Err(err) = complete.status.to_result() {
            warn!(
                "[LIFECYCLE] Remote name request for {} failed: {:?}",
                addr.format_hex(),
                err
            );
            return Ok(());
        }

        let Some(device) = self.devices.get_mut(&addr) else {
            warn!(
                "[LIFECYCLE] Ignoring name of unrequested peer {}",
                addr.format_hex()
            );
            return Ok(());
        };
        device.set_remote_name(complete.name);
        registry.set_remote_name(addr, device.remote_name())?;

        let Some(device_type) = device.classify() else {
            warn!("[LIFECYCLE] {} reported an empty name", addr.format_hex());
            return Ok(());
        };

        if device_type == DeviceType::Unknown {
            warn!(
                "[LIFECYCLE] Unrecognized controller {}",
                addr.format_hex()
            );
        } else {
            info!(
                "[LIFECYCLE] {} is a {}",
                addr.format_hex(),
                device_type.description()
            );
        }

        registry.set_device_type(addr, device_type)?;
        if let Err(err) = registry.init_output_report(addr) {
            error!(
                "[LIFECYCLE] Output report setup for {} failed: {:?}",
                addr.format_hex(),
                err
            );
        }
        Ok(())
    }

    /// Log a role change
    pub fn on_role_change(&self, change: &RoleChange) {
        if change.status.to_result().is_ok() {
            info!(
                "[LIFECYCLE] {} is now {}",
                change.bd_addr.format_hex(),
                if change.role == ROLE_MASTER { "master" } else { "slave" }
            );
        } else {
            warn!(
                "[LIFECYCLE] Role change with {} failed: {:?}",
                change.bd_addr.format_hex(),
                change.status
            );
        }
    }

    /// Log a page scan repetition mode change
    pub fn on_page_scan_repetition_mode_change(&self, change: &PageScanRepetitionModeChange) {
        debug!(
            "[LIFECYCLE] {} page scan repetition mode R{}",
            change.bd_addr.format_hex(),
            change.mode
        );
    }
}
