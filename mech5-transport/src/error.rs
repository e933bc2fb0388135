//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("Interface busy: {0}")]
    Busy(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Short transfer: expected {expected} bytes, transferred {actual}")]
    ShortTransfer { expected: usize, actual: usize },

    // Backend errors
    #[error("USB error: {0}")]
    Usb(String),

    #[error("HID error: {0}")]
    Hid(String),
}

impl TransportError {
    /// True when the device is gone and every further operation will fail
    pub fn is_disconnect(&self) -> bool {
        matches!(self, TransportError::Disconnected)
    }

    /// Convert into an I/O error for callers that speak `std::io`
    pub fn into_io(self) -> std::io::Error {
        use std::io::ErrorKind;
        let kind = match &self {
            TransportError::DeviceNotFound(_) => ErrorKind::NotFound,
            TransportError::Disconnected => ErrorKind::NotConnected,
            TransportError::Timeout => ErrorKind::TimedOut,
            TransportError::Busy(_) => ErrorKind::ResourceBusy,
            TransportError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            TransportError::ShortTransfer { .. } => ErrorKind::WriteZero,
            TransportError::Usb(_) | TransportError::Hid(_) => ErrorKind::Other,
        };
        std::io::Error::new(kind, self)
    }
}

impl From<rusb::Error> for TransportError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::NoDevice => TransportError::Disconnected,
            rusb::Error::Timeout => TransportError::Timeout,
            rusb::Error::Access => TransportError::PermissionDenied(e.to_string()),
            rusb::Error::Busy => TransportError::Busy(e.to_string()),
            rusb::Error::NotFound => TransportError::DeviceNotFound(e.to_string()),
            other => TransportError::Usb(other.to_string()),
        }
    }
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            TransportError::PermissionDenied(msg)
        } else {
            TransportError::Hid(msg)
        }
    }
}
