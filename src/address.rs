use crate::{WireShockError, constants::BD_ADDR_LENGTH};

/// A Bluetooth Device Address (`BD_ADDR`), the identity key of a remote controller
///
/// Bytes are kept in wire order (little-endian, least significant byte first),
/// exactly as they appear in HCI event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BluetoothAddress(pub [u8; BD_ADDR_LENGTH]);

impl BluetoothAddress {
    /// Create a new Bluetooth address from wire-order bytes
    #[must_use]
    pub const fn new(addr: [u8; BD_ADDR_LENGTH]) -> Self {
        Self(addr)
    }

    /// Format the address as a colon-separated hex string, most significant byte first
    #[must_use]
    pub fn format_hex(&self) -> heapless::String<17> {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";

        let mut result = heapless::String::new();
        for (i, byte) in self.0.iter().rev().enumerate() {
            if i > 0 {
                result.push(':').ok();
            }
            result.push(HEX[usize::from(byte >> 4)] as char).ok();
            result.push(HEX[usize::from(byte & 0x0F)] as char).ok();
        }
        result
    }
}

impl From<[u8; BD_ADDR_LENGTH]> for BluetoothAddress {
    fn from(addr: [u8; BD_ADDR_LENGTH]) -> Self {
        Self(addr)
    }
}

impl From<BluetoothAddress> for [u8; BD_ADDR_LENGTH] {
    fn from(addr: BluetoothAddress) -> Self {
        addr.0
    }
}

impl From<BluetoothAddress> for bt_hci::param::BdAddr {
    fn from(addr: BluetoothAddress) -> Self {
        bt_hci::param::BdAddr::new(addr.0)
    }
}

impl TryFrom<&[u8]> for BluetoothAddress {
    type Error = WireShockError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let addr: [u8; BD_ADDR_LENGTH] = bytes
            .try_into()
            .map_err(|_| WireShockError::InvalidParameter)?;
        Ok(BluetoothAddress(addr))
    }
}

impl TryFrom<bt_hci::param::BdAddr> for BluetoothAddress {
    type Error = WireShockError;

    fn try_from(bd_addr: bt_hci::param::BdAddr) -> Result<Self, Self::Error> {
        bd_addr.raw().try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bluetooth_address_format_hex_is_msb_first() {
        let addr = BluetoothAddress::new([0xBC, 0x9A, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(addr.format_hex().as_str(), "12:34:56:78:9A:BC");

        let zero = BluetoothAddress::default();
        assert_eq!(zero.format_hex().as_str(), "00:00:00:00:00:00");
    }

    #[test]
    fn test_bluetooth_address_conversions() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC];

        let addr: BluetoothAddress = bytes.into();
        let converted: [u8; 6] = addr.into();
        assert_eq!(converted, bytes);

        let bd_addr: bt_hci::param::BdAddr = addr.into();
        assert_eq!(BluetoothAddress::try_from(bd_addr), Ok(addr));

        assert!(BluetoothAddress::try_from(&bytes[..3]).is_err());
        assert_eq!(BluetoothAddress::try_from(&bytes[..]), Ok(addr));
    }
}
