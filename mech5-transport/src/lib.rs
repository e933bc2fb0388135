//! Transport layer for the Azio Levetron Mech5 macro keypad
//!
//! The keypad interface of the keyboard is driven directly over libusb:
//! the kernel driver is detached from that one interface, the interface is
//! claimed, and the crate then exposes the three primitives the keypad logic
//! needs:
//!
//! - fetching the raw HID report descriptor
//! - reading raw interrupt reports
//! - blocking control transfers on the default endpoint

pub mod device_registry;
pub mod error;
pub mod reader;
pub mod types;

mod discovery;
mod usb;

pub use device_registry::{is_supported, KEYPAD_INTERFACE, PRODUCT_ID, VENDOR_ID};
pub use discovery::{list_hid_collections, open_hidapi, UsbDiscovery};
pub use error::TransportError;
pub use reader::{run_report_reader_loop, ReaderConfig, ReaderExit};
pub use types::{
    ControlSetup, DiscoveredDevice, HidCollection, InterfaceClass, TransportDeviceInfo,
};
pub use usb::UsbKeypadTransport;

use std::sync::Arc;
use std::time::Duration;

/// Blocking control-transfer primitive on the device's default endpoint
///
/// Implementations must return promptly with `TransportError::Disconnected`
/// once the device is gone instead of blocking for the full timeout.
pub trait ControlPipe: Send + Sync {
    /// Send `data` in an OUT control transfer
    ///
    /// # Returns
    /// Number of bytes transferred
    fn write_control(&self, setup: ControlSetup, data: &[u8]) -> Result<usize, TransportError>;
}

/// Source of raw interrupt reports
pub trait ReportSource: Send + Sync {
    /// Read one report into `buf`
    ///
    /// # Returns
    /// `None` on timeout, `Some(len)` if a report was received
    fn read_report(&self, buf: &mut [u8], timeout: Duration)
        -> Result<Option<usize>, TransportError>;
}

impl<T: ControlPipe + ?Sized> ControlPipe for Arc<T> {
    fn write_control(&self, setup: ControlSetup, data: &[u8]) -> Result<usize, TransportError> {
        (**self).write_control(setup, data)
    }
}

impl<T: ReportSource + ?Sized> ReportSource for Arc<T> {
    fn read_report(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<usize>, TransportError> {
        (**self).read_report(buf, timeout)
    }
}
