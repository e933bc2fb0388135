//! Config file load/save and the D-Bus backlight object, without hardware.

use std::sync::Arc;

use mech5_driver::config::{BusKind, DriverConfig};
use mech5_driver::dbus::{to_fdo_error, SharedBacklight};
use mech5_keypad::{BacklightController, KeyupPolicy};
use mech5_transport::{ControlPipe, ControlSetup, TransportError};
use parking_lot::Mutex;

fn temp_config_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("mech5-test-{}-{}", std::process::id(), name))
        .join("driver.toml")
}

#[test]
fn missing_file_loads_defaults() {
    let path = temp_config_path("missing");
    let config = DriverConfig::load(&path).unwrap();
    assert_eq!(config, DriverConfig::default());
}

#[test]
fn save_then_load() {
    let path = temp_config_path("save");
    let config = DriverConfig {
        keyup_policy: KeyupPolicy::OnFirstRelease,
        verbose: true,
        device_name: "Test Keys".to_string(),
        bus: BusKind::System,
        poll_interval_ms: 500,
    };
    config.save(&path).unwrap();

    let loaded = DriverConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

#[test]
fn malformed_file_is_an_error() {
    let path = temp_config_path("malformed");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "verbose = \"sometimes\"\n").unwrap();

    assert!(DriverConfig::load(&path).is_err());

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

struct RecordingPipe {
    payloads: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl ControlPipe for RecordingPipe {
    fn write_control(&self, _setup: ControlSetup, data: &[u8]) -> Result<usize, TransportError> {
        if self.fail {
            return Err(TransportError::Timeout);
        }
        self.payloads.lock().push(data.to_vec());
        Ok(data.len())
    }
}

fn shared_backlight(fail: bool) -> (Arc<RecordingPipe>, SharedBacklight) {
    let pipe = Arc::new(RecordingPipe {
        payloads: Mutex::new(Vec::new()),
        fail,
    });
    let control: Arc<dyn ControlPipe> = Arc::clone(&pipe) as Arc<dyn ControlPipe>;
    (pipe, Arc::new(BacklightController::new(control)))
}

#[test]
fn shared_backlight_through_trait_object() {
    let (pipe, backlight) = shared_backlight(false);
    assert_eq!(backlight.store("6\n").unwrap(), 2);
    assert_eq!(backlight.show(), "4\n");
    assert_eq!(*pipe.payloads.lock(), vec![vec![0x05, 0x04]]);
}

#[test]
fn backlight_errors_map_to_dbus_errors() {
    let (_pipe, backlight) = shared_backlight(true);

    let err = backlight.store("xyz").unwrap_err();
    assert!(matches!(to_fdo_error(err), zbus::fdo::Error::InvalidArgs(_)));

    let err = backlight.store("3").unwrap_err();
    assert!(matches!(to_fdo_error(err), zbus::fdo::Error::IOError(_)));
    assert_eq!(backlight.show(), "0\n");
}
