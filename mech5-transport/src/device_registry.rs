//! Device registry - USB identity and interface layout of the Mech5
//!
//! The keyboard enumerates as two HID interfaces. Interface 0 is a plain
//! boot-protocol keyboard handled by the kernel; interface 1 carries the
//! macro keys, the system control keys and the LED output report.

use crate::types::InterfaceClass;

/// Holtek (alternate) vendor ID used by the Mech5
pub const VENDOR_ID: u16 = 0x04D9;

/// Azio Levetron Mech5 keyboard
pub const PRODUCT_ID: u16 = 0x2819;

/// Supported VID/PID pairs
///
/// The Sigma Micro numpad (1c4f:0016) shipped with the keyboard is a plain
/// HID keyboard and needs no driver.
pub const SUPPORTED_DEVICES: &[(u16, u16)] = &[(VENDOR_ID, PRODUCT_ID)];

/// Interface number of the macro keypad / LED interface
pub const KEYPAD_INTERFACE: u8 = 1;

/// Interrupt IN endpoint of the keypad interface
pub const KEYPAD_ENDPOINT: u8 = 0x82;

/// Largest report the keypad interface sends (report 7 is id + 20 bytes)
pub const MAX_REPORT_SIZE: usize = 64;

/// USB HID interface class
pub const CLASS_HID: u8 = 0x03;

/// HID boot interface subclass
pub const SUBCLASS_BOOT: u8 = 0x01;

/// HID boot protocol: keyboard
pub const PROTOCOL_KEYBOARD: u8 = 0x01;

/// GET_DESCRIPTOR request for the HID report descriptor of an interface
pub mod descriptor_request {
    /// Device-to-host, standard, interface recipient
    pub const REQUEST_TYPE: u8 = 0x81;
    /// GET_DESCRIPTOR
    pub const REQUEST: u8 = 0x06;
    /// Descriptor type 0x22 (report), index 0
    pub const VALUE: u16 = 0x2200;
    /// Largest descriptor the keyboard reports (0x77 bytes in captures)
    pub const MAX_LENGTH: usize = 0x100;
}

/// Check if a VID/PID pair is a supported keyboard
#[inline]
pub fn is_supported(vid: u16, pid: u16) -> bool {
    SUPPORTED_DEVICES.contains(&(vid, pid))
}

/// Classify a HID interface from its USB interface descriptor triple
pub fn classify_interface(class: u8, subclass: u8, protocol: u8) -> InterfaceClass {
    if class == CLASS_HID && subclass == SUBCLASS_BOOT && protocol == PROTOCOL_KEYBOARD {
        InterfaceClass::BootKeyboard
    } else {
        InterfaceClass::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_device() {
        assert!(is_supported(0x04D9, 0x2819));
    }

    #[test]
    fn test_numpad_not_supported() {
        assert!(!is_supported(0x1C4F, 0x0016));
        assert!(!is_supported(0x04D9, 0x0000));
    }

    #[test]
    fn test_classify_boot_keyboard() {
        assert_eq!(classify_interface(3, 1, 1), InterfaceClass::BootKeyboard);
    }

    #[test]
    fn test_classify_other_interfaces() {
        // keypad interface: HID, no subclass, no protocol
        assert_eq!(classify_interface(3, 0, 0), InterfaceClass::Other);
        // boot mouse is not a keyboard
        assert_eq!(classify_interface(3, 1, 2), InterfaceClass::Other);
    }
}
