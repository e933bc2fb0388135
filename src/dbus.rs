//! D-Bus control surface for the backlight.
//!
//! Bus name: `org.mech5.Keypad1`
//! Object path: `/org/mech5/Keypad1/<n>`, one per keypad with LED control

use std::sync::Arc;

use mech5_keypad::{BacklightController, KeypadError};
use mech5_transport::ControlPipe;
use zbus::interface;

pub const BUS_NAME: &str = "org.mech5.Keypad1";
pub const INTERFACE_NAME: &str = "org.mech5.Keypad1";
pub const OBJECT_PATH_PREFIX: &str = "/org/mech5/Keypad1";

/// Backlight as shared between the reader thread and the D-Bus object
pub type SharedBacklight = Arc<BacklightController<Arc<dyn ControlPipe>>>;

/// Object path of the `index`th attached keypad
pub fn object_path(index: u32) -> String {
    format!("{OBJECT_PATH_PREFIX}/{index}")
}

/// Map a backlight failure onto a D-Bus error
pub fn to_fdo_error(err: KeypadError) -> zbus::fdo::Error {
    match err {
        KeypadError::Parse(e) => zbus::fdo::Error::InvalidArgs(format!("invalid level: {e}")),
        KeypadError::Transport(e) => zbus::fdo::Error::IOError(e.to_string()),
        KeypadError::LedControlUnavailable => zbus::fdo::Error::NotSupported(err.to_string()),
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

/// D-Bus interface implementation.
pub struct KeypadInterface {
    backlight: SharedBacklight,
    location: String,
}

impl KeypadInterface {
    pub fn new(backlight: SharedBacklight, location: String) -> Self {
        Self {
            backlight,
            location,
        }
    }
}

#[interface(name = "org.mech5.Keypad1")]
impl KeypadInterface {
    /// Last backlight level written, as "<level>\n".
    #[zbus(property)]
    async fn led(&self) -> zbus::fdo::Result<String> {
        // The level lock is held for the whole USB transfer of a write
        let backlight = Arc::clone(&self.backlight);
        tokio::task::spawn_blocking(move || backlight.show())
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// USB location of the keypad interface ("bus-address:interface").
    #[zbus(property)]
    async fn location(&self) -> String {
        self.location.clone()
    }

    /// Set the backlight level. Returns the number of bytes consumed.
    async fn store_led(&self, value: String) -> zbus::fdo::Result<u64> {
        let backlight = Arc::clone(&self.backlight);
        let consumed = tokio::task::spawn_blocking(move || backlight.store(&value))
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?
            .map_err(to_fdo_error)?;
        Ok(consumed as u64)
    }
}
