//! USB transport seams
//!
//! HCI commands leave through the control endpoint, events arrive on the
//! interrupt IN endpoint. The bus driver implements both traits.

/// USB control transfer failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The device did not answer within the transfer timeout
    Timeout,
    /// The device stalled the request
    Stall,
    /// The device is gone
    Disconnected,
    /// Any other bus failure, with the bus driver's status code
    Other(i32),
}

/// Read failure reported by the interrupt pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadFailure {
    /// Completion status of the read
    pub status: i32,
    /// USB-level status of the read
    pub usbd_status: u32,
}

/// Control endpoint used to submit HCI command packets
pub trait UsbTransport {
    /// Send one HCI command packet as a class control transfer
    ///
    /// Blocks until the transfer completes or its timeout expires.
    ///
    /// # Errors
    /// Returns the bus failure if the transfer did not complete.
    fn send_control(&mut self, packet: &[u8]) -> Result<(), TransportError>;
}

/// Interrupt IN endpoint delivering HCI event packets
#[allow(async_fn_in_trait)]
pub trait InterruptPipe {
    /// Read one transfer into `buf`, returning the transferred length
    ///
    /// # Errors
    /// Returns the failed read's status.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadFailure>;
}
