//! Unified error types for the bridge firmware.
//!
//! Every adapter keeps its own small error enum (see [`crate::app::ports`]
//! and [`crate::adapters`]); all of them convert into [`Error`] so the
//! bootstrap and the main loop can report failures uniformly.
//! All variants are `Copy` so they travel through retry loops without
//! allocation.

use core::fmt;

use crate::adapters::wifi::ConnectivityError;
use crate::app::ports::{PeripheralError, TransportError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Wi-Fi association or credential handling failed.
    Wifi(ConnectivityError),
    /// The HTTP/MQTT backend could not be reached or rejected a request.
    Transport(TransportError),
    /// The BLE stack refused an operation.
    Peripheral(PeripheralError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wifi(e) => write!(f, "wifi: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Peripheral(e) => write!(f, "ble: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Wifi(e)
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<PeripheralError> for Error {
    fn from(e: PeripheralError) -> Self {
        Self::Peripheral(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
