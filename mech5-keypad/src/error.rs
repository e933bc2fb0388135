//! Keypad error types

use mech5_transport::TransportError;
use thiserror::Error;

use crate::interpreter::KeyupPolicy;

/// Errors from keypad operations
#[derive(Error, Debug)]
pub enum KeypadError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Control-surface input is not a non-negative decimal integer
    #[error("Invalid value: {0}")]
    Parse(#[from] std::num::ParseIntError),

    /// Keyup policy that the wire protocol cannot support
    #[error("Keyup policy {0:?} is not supported by this device")]
    UnsupportedPolicy(KeyupPolicy),

    /// Report descriptor unusable even after normalization
    #[error("Invalid report descriptor: {0}")]
    InvalidDescriptor(String),

    /// Input sink rejected an event
    #[error("Input sink error: {0}")]
    Sink(#[source] std::io::Error),

    /// This interface has no LED control
    #[error("LED control is not available on this interface")]
    LedControlUnavailable,
}
