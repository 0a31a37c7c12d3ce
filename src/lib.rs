//! BLE → HTTP/MQTT status bridge firmware library.
//!
//! Exposes the pure-logic modules for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; every adapter has a host simulation path.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bootstrap;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod liveness;
pub mod retry;
pub mod status;
