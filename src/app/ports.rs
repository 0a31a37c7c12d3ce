//! Port traits: the hexagonal boundary between bridge logic and the radios.
//!
//! ```text
//!   BLE stack ──▶ GattCallbacks ──▶ BridgeService ──▶ TransportPort ──▶ backend
//!                      │                  │
//!                      └── PeripheralPort ◀┘
//! ```
//!
//! Driven adapters (BLE GATT server, HTTP client, MQTT client, system
//! timer) implement these traits.  [`BridgeService`](super::service::BridgeService)
//! only ever sees the traits, so the whole connect/disconnect/write flow
//! runs on the host against recording mocks.

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain → backend)
// ───────────────────────────────────────────────────────────────

/// Outbound channel to the status backend (HTTP endpoint or MQTT broker).
pub trait TransportPort {
    /// One-shot boot handshake.
    ///
    /// HTTP posts the fixed diagnostic body; MQTT connects to the broker
    /// and subscribes to the inbound topic.
    fn handshake(&mut self) -> Result<(), TransportError>;

    /// Deliver one serialized status document.  Fire-and-forget: no
    /// retry, no queueing.
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Backend liveness as last observed by the adapter.
    fn is_connected(&self) -> bool;

    /// Short label for log lines.
    fn name(&self) -> &'static str;
}

/// Errors from [`TransportPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The adapter has no live session (MQTT not connected yet).
    NotConnected,
    /// Connection setup to the backend failed.
    Connect,
    /// The HTTP request could not be written or no response arrived.
    Request,
    /// The HTTP server answered with an error status.
    Status(u16),
    /// MQTT publish was refused by the client.
    Publish,
    /// MQTT subscribe was refused by the client.
    Subscribe,
    /// Payload exceeds what the adapter can carry.
    PayloadTooLarge,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "backend not connected"),
            Self::Connect => write!(f, "backend connect failed"),
            Self::Request => write!(f, "HTTP request failed"),
            Self::Status(code) => write!(f, "HTTP status {code}"),
            Self::Publish => write!(f, "MQTT publish failed"),
            Self::Subscribe => write!(f, "MQTT subscribe failed"),
            Self::PayloadTooLarge => write!(f, "payload too large"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Peripheral port (driven adapter: domain → BLE GATT server)
// ───────────────────────────────────────────────────────────────

/// Advertising / connection state of the GATT peripheral.
///
/// Advertising is restarted on every connect so further clients can
/// join; `Connected` therefore says nothing about whether the beacon is
/// currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralState {
    /// Stack up, beacon off, nobody connected.
    Idle,
    /// Beacon on, nobody connected.
    Advertising,
    /// At least one central holds a link.
    Connected { links: u16 },
}

/// What the bridge logic may ask of the BLE peripheral.
pub trait PeripheralPort {
    /// (Re)start the advertising beacon.  Calling this while already
    /// advertising is a no-op that returns `Ok`.
    fn start_advertising(&mut self) -> Result<(), PeripheralError>;

    /// Replace the characteristic value served to reads.
    fn set_value(&mut self, value: &[u8]) -> Result<(), PeripheralError>;

    /// Push the characteristic value to subscribed centrals.
    fn notify(&mut self, value: &[u8]) -> Result<(), PeripheralError>;

    fn state(&self) -> PeripheralState;
}

/// Errors from [`PeripheralPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralError {
    /// Controller / Bluedroid bring-up failed.
    StackInitFailed,
    /// GATT service or characteristic is not registered yet.
    NotReady,
    /// Advertising could not be (re)started.
    AdvertisingFailed,
    /// Notification could not be queued.
    NotifyFailed,
    /// Value exceeds the characteristic's maximum length.
    ValueTooLong,
}

impl fmt::Display for PeripheralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackInitFailed => write!(f, "BLE stack initialisation failed"),
            Self::NotReady => write!(f, "GATT service not registered"),
            Self::AdvertisingFailed => write!(f, "advertising start failed"),
            Self::NotifyFailed => write!(f, "notify failed"),
            Self::ValueTooLong => write!(f, "characteristic value too long"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// GATT callbacks (driving adapter: BLE stack → domain)
// ───────────────────────────────────────────────────────────────

/// Capability interface the BLE binding invokes for lifecycle and
/// characteristic events.
///
/// Exactly one concrete handler ([`BridgeService`](super::service::BridgeService))
/// is registered at startup.  Every call receives the peripheral so the
/// handler can notify or re-advertise without owning the radio.
pub trait GattCallbacks {
    fn on_connect(&mut self, conn_id: u16, peripheral: &mut dyn PeripheralPort);

    fn on_disconnect(&mut self, conn_id: u16, peripheral: &mut dyn PeripheralPort);

    fn on_write(&mut self, conn_id: u16, value: &[u8], peripheral: &mut dyn PeripheralPort);

    fn on_read(&mut self, conn_id: u16);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time since boot.
pub trait ClockPort {
    fn uptime_ms(&self) -> u64;
}
