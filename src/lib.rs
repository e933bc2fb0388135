// Azio Levetron Mech5 userspace driver - shared library
// Configuration, virtual input device, D-Bus surface and the daemon

pub mod config;
pub mod daemon;
pub mod dbus;
pub mod uinput;

pub use config::{BusKind, DriverConfig};
pub use dbus::{KeypadInterface, SharedBacklight, BUS_NAME};
pub use uinput::VirtualKeypad;
