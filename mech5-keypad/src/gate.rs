//! Per-interface capability gate
//!
//! The keyboard exposes a boot-protocol keyboard interface and a second,
//! vendor-flavoured interface. Only the latter carries the macro keys and
//! accepts the backlight report.

use mech5_transport::{InterfaceClass, TransportDeviceInfo};

/// Whether the backlight control should be published for this interface
pub fn has_led_control(info: &TransportDeviceInfo) -> bool {
    info.interface_class == InterfaceClass::Other
}
