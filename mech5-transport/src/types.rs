//! Common types for transport layer

use std::time::Duration;

/// Kind of HID interface as seen by the kernel
///
/// The kernel only marks boot-protocol keyboards and mice specially; every
/// other HID interface is "other".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceClass {
    /// Boot-protocol keyboard (class 3, subclass 1, protocol 1)
    BootKeyboard,
    /// Any other HID interface
    Other,
}

/// Device identification information
#[derive(Debug, Clone)]
pub struct TransportDeviceInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// USB bus number
    pub bus: u8,
    /// USB device address on the bus
    pub address: u8,
    /// Interface number this transport is bound to
    pub interface_number: u8,
    /// Classification of that interface
    pub interface_class: InterfaceClass,
    /// Product name if available
    pub product_name: Option<String>,
}

impl TransportDeviceInfo {
    /// Stable identifier for logs: "bus-address:interface"
    pub fn location(&self) -> String {
        format!("{:03}-{:03}:{}", self.bus, self.address, self.interface_number)
    }
}

/// Setup stage of a control transfer on the default endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSetup {
    /// bmRequestType
    pub request_type: u8,
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
    /// Transfer timeout
    pub timeout: Duration,
}

/// Discovered device that can be opened
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Device information
    pub info: TransportDeviceInfo,
}

/// One HID top-level collection as reported by hidapi
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidCollection {
    pub vid: u16,
    pub pid: u16,
    pub interface_number: i32,
    pub usage_page: u16,
    pub usage: u16,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_format() {
        let info = TransportDeviceInfo {
            vid: 0x04D9,
            pid: 0x2819,
            bus: 1,
            address: 12,
            interface_number: 1,
            interface_class: InterfaceClass::Other,
            product_name: None,
        };
        assert_eq!(info.location(), "001-012:1");
    }
}
