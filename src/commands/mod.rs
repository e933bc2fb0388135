//! Command handlers for the CLI application.
//!
//! - `led`: backlight level through the running daemon (D-Bus)
//! - `list`: keypad interfaces and HID collections
//! - `descriptor`: report descriptor inspection and normalization
//!
//! `daemon` lives in the library (`mech5_driver::daemon`).

pub mod descriptor;
pub mod led;
pub mod list;
