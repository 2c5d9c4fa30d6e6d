//! Child-device registry
//!
//! The registry is the authoritative list of live children, one per remote
//! controller. The lifecycle coordinator only mirrors its own records into it
//! through [`DeviceRegistry`], so any device-enumeration backend can sit
//! behind the trait. [`ChildList`] is the fixed-capacity in-memory backend.

use crate::{
    BluetoothAddress,
    device::{AclHandle, DeviceType, RemoteName},
};
use heapless::FnvIndexMap;

/// Registry rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// No child is registered under this address
    NotFound,
    /// The registry has no room for another child
    Full,
}

/// External child-device registry
pub trait DeviceRegistry {
    /// Register a child, or mark an existing one present again
    ///
    /// # Errors
    /// Returns `RegistryError::Full` if a new child does not fit.
    fn add_or_update_present(&mut self, address: BluetoothAddress) -> Result<(), RegistryError>;

    /// Report a child as gone
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` for an unknown address.
    fn mark_missing(&mut self, address: BluetoothAddress) -> Result<(), RegistryError>;

    /// Drop every child
    fn purge_all(&mut self);

    /// Bind a connection handle to a child
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` for an unknown address.
    fn bind_handle(
        &mut self,
        address: BluetoothAddress,
        handle: AclHandle,
    ) -> Result<(), RegistryError>;

    /// Find the child owning a connection handle
    fn lookup_by_handle(&self, handle: AclHandle) -> Option<BluetoothAddress>;

    /// Store the remote name of a child
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` for an unknown address.
    fn set_remote_name(
        &mut self,
        address: BluetoothAddress,
        name: &[u8],
    ) -> Result<(), RegistryError>;

    /// Store the device type of a child
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` for an unknown address.
    fn set_device_type(
        &mut self,
        address: BluetoothAddress,
        device_type: DeviceType,
    ) -> Result<(), RegistryError>;

    /// Hand the child over to the output report path
    ///
    /// # Errors
    /// Returns `RegistryError::NotFound` for an unknown address.
    fn init_output_report(&mut self, address: BluetoothAddress) -> Result<(), RegistryError>;
}

/// One registered child
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Child {
    /// Handle of the ACL link, once connected
    pub handle: Option<AclHandle>,
    /// Remote name, empty until read
    pub remote_name: RemoteName,
    /// Device type, `Unknown` until classified
    pub device_type: DeviceType,
    /// Whether the output report template was set up
    pub output_report_initialized: bool,
}

/// In-memory [`DeviceRegistry`] holding up to `N` children
///
/// `N` must be a power of two greater than one.
#[derive(Debug, Default)]
pub struct ChildList<const N: usize> {
    children: FnvIndexMap<BluetoothAddress, Child, N>,
}

impl<const N: usize> ChildList<N> {
    /// Create an empty child list
    #[must_use]
    pub fn new() -> Self {
        Self {
            children: FnvIndexMap::new(),
        }
    }

    /// Registered child for an address
    #[must_use]
    pub fn child(&self, address: &BluetoothAddress) -> Option<&Child> {
        self.children.get(address)
    }

    /// Whether a child is registered for an address
    #[must_use]
    pub fn is_present(&self, address: &BluetoothAddress) -> bool {
        self.children.contains_key(address)
    }

    /// Number of registered children
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether no child is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Iterate over the registered children
    pub fn iter(&self) -> impl Iterator<Item = (&BluetoothAddress, &Child)> {
        self.children.iter()
    }

    fn child_mut(&mut self, address: &BluetoothAddress) -> Result<&mut Child, RegistryError> {
        self.children.get_mut(address).ok_or(RegistryError::NotFound)
    }
}

impl<const N: usize> DeviceRegistry for ChildList<N> {
    fn add_or_update_present(&mut self, address: BluetoothAddress) -> Result<(), RegistryError> {
        if self.children.contains_key(&address) {
            return Ok(());
        }
        self.children
            .insert(address, Child::default())
            .map(|_| ())
            .map_err(|_| RegistryError::Full)
    }

    fn mark_missing(&mut self, address: BluetoothAddress) -> Result<(), RegistryError> {
        self.children
            .remove(&address)
            .map(|_| ())
            .ok_or(RegistryError::NotFound)
    }

    fn purge_all(&mut self) {
        self.children.clear();
    }

    fn bind_handle(
        &mut self,
        address: BluetoothAddress,
        handle: AclHandle,
    ) -> Result<(), RegistryError> {
        self.child_mut(&address)?.handle = Some(handle);
        Ok(())
    }

    fn lookup_by_handle(&self, handle: AclHandle) -> Option<BluetoothAddress> {
        self.children
            .iter()
            .find(|(_, child)| child.handle == Some(handle))
            .map(|(address, _)| *address)
    }

    fn set_remote_name(
        &mut self,
        address: BluetoothAddress,
        name: &[u8],
    ) -> Result<(), RegistryError> {
        let child = self.child_mut(&address)?;
        let len = name.len().min(child.remote_name.capacity());
        child.remote_name.clear();
        child
            .remote_name
            .extend_from_slice(&name[..len])
            .map_err(|()| RegistryError::Full)
    }

    fn set_device_type(
        &mut self,
        address: BluetoothAddress,
        device_type: DeviceType,
    ) -> Result<(), RegistryError> {
        self.child_mut(&address)?.device_type = device_type;
        Ok(())
    }

    fn init_output_report(&mut self, address: BluetoothAddress) -> Result<(), RegistryError> {
        self.child_mut(&address)?.output_report_initialized = true;
        Ok(())
    }
}
