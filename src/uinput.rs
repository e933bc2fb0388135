//! Virtual keyboard device using evdev/uinput
//!
//! Creates a keyboard declaring the key codes the keypad can produce: the
//! macro keys plus whatever the normalized descriptor reports. Events are
//! buffered until `sync`, which emits the batch followed by `SYN_REPORT`.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, EventType, InputEvent, Key,
};
use mech5_keypad::{InputSink, KeyCode};
use std::io;
use thiserror::Error;

/// Errors from virtual keypad setup
#[derive(Debug, Error)]
pub enum VirtualKeypadError {
    #[error("Failed to create virtual device: {0}")]
    CreateDevice(#[source] io::Error),
}

/// Virtual keypad device
pub struct VirtualKeypad {
    device: VirtualDevice,
    /// Events queued since the last sync
    pending: Vec<InputEvent>,
}

impl VirtualKeypad {
    /// Create a new virtual keypad
    ///
    /// # Arguments
    /// * `name` - Device name (shown in `evtest` and `libinput list-devices`)
    /// * `keys` - Key codes the device declares, see
    ///   [`advertised_keys`](mech5_keypad::advertised_keys)
    pub fn new(name: &str, keys: &[KeyCode]) -> Result<Self, VirtualKeypadError> {
        let mut key_set = AttributeSet::<Key>::new();
        for code in keys {
            key_set.insert(Key::new(code.code()));
        }

        let device = VirtualDeviceBuilder::new()
            .map_err(VirtualKeypadError::CreateDevice)?
            .name(name)
            .with_keys(&key_set)
            .map_err(VirtualKeypadError::CreateDevice)?
            .build()
            .map_err(VirtualKeypadError::CreateDevice)?;

        Ok(Self {
            device,
            pending: Vec::new(),
        })
    }

    /// Get the device path (e.g., /dev/input/eventX)
    pub fn device_path(&mut self) -> Option<std::path::PathBuf> {
        self.device
            .enumerate_dev_nodes_blocking()
            .ok()?
            .next()?
            .ok()
    }
}

impl InputSink for VirtualKeypad {
    fn report_key(&mut self, code: KeyCode, pressed: bool) -> io::Result<()> {
        self.pending.push(key_event(code, pressed));
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        // emit() terminates the batch with SYN_REPORT
        let result = self.device.emit(&self.pending);
        self.pending.clear();
        result
    }
}

fn key_event(code: KeyCode, pressed: bool) -> InputEvent {
    InputEvent::new(EventType::KEY, code.code(), i32::from(pressed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_event_values() {
        let down = key_event(KeyCode::KEY_F17, true);
        assert_eq!(down.event_type(), EventType::KEY);
        assert_eq!(down.code(), Key::KEY_F17.code());
        assert_eq!(down.value(), 1);

        let up = key_event(KeyCode::KEY_F22, false);
        assert_eq!(up.code(), Key::KEY_F22.code());
        assert_eq!(up.value(), 0);
    }

    #[test]
    #[ignore] // Requires write access to /dev/uinput
    fn test_create_virtual_keypad() {
        let keys = mech5_keypad::advertised_keys(&mech5_keypad::FIXED_DESCRIPTOR).unwrap();
        let mut keypad = VirtualKeypad::new("mech5 test keypad", &keys).unwrap();
        keypad.report_key(KeyCode::KEY_F18, true).unwrap();
        keypad.report_key(KeyCode::KEY_VOLUMEUP, true).unwrap();
        keypad.report_key(KeyCode::KEY_F18, false).unwrap();
        keypad.report_key(KeyCode::KEY_VOLUMEUP, false).unwrap();
        keypad.sync().unwrap();
        assert!(keypad.pending.is_empty());
    }
}
