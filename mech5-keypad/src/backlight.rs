//! Backlight level control
//!
//! The backlight is set with a HID SET_REPORT on the default endpoint,
//! output report 5 with a single level byte. The device cannot be queried,
//! so the last level written successfully is cached and returned on reads.

use mech5_transport::{ControlPipe, ControlSetup};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::descriptor::REPORT_ID_LED;
use crate::error::KeypadError;

/// Highest backlight level
pub const LEVEL_MAX: u8 = 4;

/// Bits of the requested value the device looks at
pub const LEVEL_MASK: u64 = 0x0F;

/// SET_REPORT control transfer parameters
pub mod set_report {
    use std::time::Duration;

    /// Host-to-device, class, interface recipient
    pub const REQUEST_TYPE: u8 = 0x21;
    /// HID SET_REPORT
    pub const REQUEST: u8 = 0x09;
    /// Report type output (0x02) << 8 | report id 5
    pub const VALUE: u16 = 0x0205;
    /// Keypad interface
    pub const INDEX: u16 = 0x0001;
    pub const TIMEOUT: Duration = Duration::from_millis(2000);
}

/// Reduce a requested value to a level the device accepts
///
/// Only the low four bits are kept, then the result is capped at
/// [`LEVEL_MAX`]. So 18 becomes 2, and 15 becomes 4.
pub fn clamp_level(value: u64) -> u8 {
    // masked value fits in a u8
    ((value & LEVEL_MASK) as u8).min(LEVEL_MAX)
}

/// Parse control-surface input: a decimal integer, optionally followed by
/// one newline
pub fn parse_level_input(input: &str) -> Result<u64, KeypadError> {
    let trimmed = input.strip_suffix('\n').unwrap_or(input);
    Ok(trimmed.parse::<u64>()?)
}

/// Setup packet for a backlight write
pub fn setup_packet() -> ControlSetup {
    ControlSetup {
        request_type: set_report::REQUEST_TYPE,
        request: set_report::REQUEST,
        value: set_report::VALUE,
        index: set_report::INDEX,
        timeout: set_report::TIMEOUT,
    }
}

/// Serialized backlight writer with a cached level
pub struct BacklightController<C: ControlPipe> {
    control: C,
    /// Last level the device acknowledged. Held for the full duration of a
    /// write so concurrent writers are serialized.
    level: Mutex<u8>,
}

impl<C: ControlPipe> BacklightController<C> {
    /// Create a controller; the cache starts at 0
    pub fn new(control: C) -> Self {
        Self {
            control,
            level: Mutex::new(0),
        }
    }

    /// Last successfully written level
    pub fn get(&self) -> u8 {
        *self.level.lock()
    }

    /// Write a level to the device
    ///
    /// The value is clamped with [`clamp_level`] first. On failure the
    /// cached level is left unchanged.
    pub fn set(&self, value: u64) -> Result<u8, KeypadError> {
        let level = clamp_level(value);
        let mut cached = self.level.lock();

        let payload = [REPORT_ID_LED, level];
        match self.control.write_control(setup_packet(), &payload) {
            Ok(_) => {
                debug!("Backlight level {} (requested {})", level, value);
                *cached = level;
                Ok(level)
            }
            Err(e) => {
                warn!("Failed to set backlight level {}: {}", level, e);
                Err(e.into())
            }
        }
    }

    /// Text form of the current level
    pub fn show(&self) -> String {
        format!("{}\n", self.get())
    }

    /// Parse and apply control-surface input
    ///
    /// # Returns
    /// Length of the consumed input on success
    pub fn store(&self, input: &str) -> Result<usize, KeypadError> {
        let value = parse_level_input(input)?;
        self.set(value)?;
        Ok(input.len())
    }
}
