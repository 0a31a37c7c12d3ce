//! Application core: bridge logic, zero I/O.
//!
//! The connect/disconnect/write handlers and the connection bookkeeping
//! live here.  All interaction with radios and the backend happens
//! through the **port traits** in [`ports`], keeping this layer testable
//! on the host.

pub mod ports;
pub mod service;
pub mod state;
