//! Recording mocks for integration tests.
//!
//! Every port call is captured so tests can assert on the full history
//! without a radio or a backend.

use std::cell::Cell;
use std::rc::Rc;

use blebridge::app::ports::{
    ClockPort, PeripheralError, PeripheralPort, PeripheralState, TransportError, TransportPort,
};
use blebridge::events::EventQueue;
use embedded_hal::delay::DelayNs;

/// A fresh queue per test; the process-wide one is shared between threads.
pub fn leaked_queue() -> &'static EventQueue {
    Box::leak(Box::new(EventQueue::new()))
}

// ── Transport ─────────────────────────────────────────────────

pub struct RecordingTransport {
    pub sent: Vec<String>,
    pub handshakes: u32,
    pub up: bool,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self { sent: Vec::new(), handshakes: 0, up: true }
    }

    pub fn messages(&self) -> Vec<serde_json::Value> {
        self.sent
            .iter()
            .map(|s| serde_json::from_str(s).expect("valid JSON"))
            .collect()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportPort for RecordingTransport {
    fn handshake(&mut self) -> Result<(), TransportError> {
        self.handshakes += 1;
        if self.up { Ok(()) } else { Err(TransportError::Connect) }
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.up {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(String::from_utf8(payload.to_vec()).expect("utf8 payload"));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.up
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// ── Time ──────────────────────────────────────────────────────

/// Clock and delay on one shared simulated timeline.
#[derive(Clone, Default)]
pub struct SimTime(Rc<Cell<u64>>);

#[allow(dead_code)]
impl SimTime {
    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl ClockPort for SimTime {
    fn uptime_ms(&self) -> u64 {
        self.0.get()
    }
}

impl DelayNs for SimTime {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(u64::from(ns) / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms));
    }
}

// ── Peripheral ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RadioCall {
    Advertise,
    SetValue(Vec<u8>),
    Notify(Vec<u8>),
}

#[derive(Default)]
pub struct MockRadio {
    pub calls: Vec<RadioCall>,
}

#[allow(dead_code)]
impl MockRadio {
    pub fn advertise_count(&self) -> usize {
        self.calls.iter().filter(|c| **c == RadioCall::Advertise).count()
    }
}

impl PeripheralPort for MockRadio {
    fn start_advertising(&mut self) -> Result<(), PeripheralError> {
        self.calls.push(RadioCall::Advertise);
        Ok(())
    }

    fn set_value(&mut self, value: &[u8]) -> Result<(), PeripheralError> {
        self.calls.push(RadioCall::SetValue(value.to_vec()));
        Ok(())
    }

    fn notify(&mut self, value: &[u8]) -> Result<(), PeripheralError> {
        self.calls.push(RadioCall::Notify(value.to_vec()));
        Ok(())
    }

    fn state(&self) -> PeripheralState {
        PeripheralState::Advertising
    }
}
