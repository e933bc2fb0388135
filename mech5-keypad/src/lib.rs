//! Device logic for the Azio Levetron Mech5 macro keypad
//!
//! This crate has no direct I/O; it works against the
//! [`ControlPipe`](mech5_transport::ControlPipe) primitive of the transport
//! crate and an [`InputSink`] supplied by the caller.
//!
//! # Components
//!
//! - [`descriptor`]: replaces the malformed report descriptor the device
//!   reports with a corrected one
//! - [`interpreter`]: turns macro key reports into key events
//! - [`generic`]: decodes the remaining input reports from the descriptor
//! - [`backlight`]: writes the backlight level and caches it
//! - [`gate`]: decides which interface gets the backlight control
//! - [`context`]: ties the above together per attached interface

pub mod backlight;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod gate;
pub mod generic;
pub mod hid_usage;
pub mod interpreter;
pub mod keymap;
pub mod sink;

pub use backlight::{clamp_level, BacklightController};
pub use context::{advertised_keys, DeviceConfig, DeviceContext};
pub use descriptor::{normalize, ReportDescriptor, FIXED_DESCRIPTOR};
pub use error::KeypadError;
pub use gate::has_led_control;
pub use generic::GenericInput;
pub use interpreter::{KeyEventInterpreter, KeyState, KeyupPolicy, ReportDisposition};
pub use keymap::{KeyCode, KEY_MAP};
pub use sink::{InputSink, RecordingSink, SinkEvent};

// Re-export transport for convenience
pub use mech5_transport;
