//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock or simulated adapters.  All tests run on the host
//! (x86_64) with no radio required.

mod ble_flow_tests;
mod bootstrap_tests;
mod mocks;
mod service_tests;
