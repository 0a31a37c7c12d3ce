//! Bridge service: the hexagonal core.
//!
//! [`BridgeService`] is the single [`GattCallbacks`] handler.  It owns the
//! connection record and the status reporter; the BLE peripheral is lent
//! to each callback so the service can notify and re-advertise without
//! owning the radio.
//!
//! ```text
//!  GattCallbacks ──▶ ┌──────────────────────────┐ ──▶ TransportPort
//!                    │       BridgeService      │
//! PeripheralPort ◀── │ ConnectionRecord · Status│
//!                    └──────────────────────────┘
//! ```

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::status::{StatusMessage, StatusReporter};

use super::ports::{ClockPort, GattCallbacks, PeripheralPort, TransportPort};
use super::state::ConnectionRecord;

/// Value set and notified to every newly connected central.
pub const CONNECT_PLACEHOLDER: &[u8] = b"XXXXXXXXXX";

pub const MSG_CONNECTED: &str = "new device connected";
pub const MSG_DISCONNECTED: &str = "device disconnected";
pub const MSG_WRITTEN: &str = "client wrote something";

/// Default wait after a disconnect before advertising again.
pub const DEFAULT_DISCONNECT_SETTLE_MS: u32 = 500;

// ───────────────────────────────────────────────────────────────
// BridgeService
// ───────────────────────────────────────────────────────────────

pub struct BridgeService<T, C, D> {
    reporter: StatusReporter<T>,
    record: ConnectionRecord,
    clock: C,
    delay: D,
    disconnect_settle_ms: u32,
}

impl<T, C, D> BridgeService<T, C, D>
where
    T: TransportPort,
    C: ClockPort,
    D: DelayNs,
{
    pub fn new(transport: T, clock: C, delay: D, disconnect_settle_ms: u32) -> Self {
        Self {
            reporter: StatusReporter::new(transport),
            record: ConnectionRecord::new(),
            clock,
            delay,
            disconnect_settle_ms,
        }
    }

    pub fn record(&self) -> &ConnectionRecord {
        &self.record
    }

    pub fn reporter(&self) -> &StatusReporter<T> {
        &self.reporter
    }

    pub fn transport(&self) -> &T {
        self.reporter.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.reporter.transport_mut()
    }

    /// Build and send one status document.  Failures are already logged
    /// and counted by the reporter.
    fn report(&mut self, conn_id: u16, message: &str, clients: Option<u32>) {
        let msg = StatusMessage {
            time: self.clock.uptime_ms(),
            device_id: conn_id,
            message,
            clients,
        };
        if let Err(e) = self.reporter.report(&msg) {
            debug!("BRIDGE | status for conn {} not delivered: {}", conn_id, e);
        }
    }

    fn readvertise(peripheral: &mut dyn PeripheralPort) {
        if let Err(e) = peripheral.start_advertising() {
            warn!("BLE: advertising restart failed: {}", e);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// GATT callbacks
// ───────────────────────────────────────────────────────────────

impl<T, C, D> GattCallbacks for BridgeService<T, C, D>
where
    T: TransportPort,
    C: ClockPort,
    D: DelayNs,
{
    fn on_connect(&mut self, conn_id: u16, peripheral: &mut dyn PeripheralPort) {
        let clients = self.record.connected(conn_id);
        info!("new device {} connected ({} total)", conn_id, clients);

        if let Err(e) = peripheral.set_value(CONNECT_PLACEHOLDER) {
            warn!("BLE: set value failed: {}", e);
        }
        if let Err(e) = peripheral.notify(CONNECT_PLACEHOLDER) {
            warn!("BLE: notify failed: {}", e);
        }
        // Keep the beacon on so further centrals can join.
        Self::readvertise(peripheral);

        self.report(conn_id, MSG_CONNECTED, Some(clients));
    }

    fn on_disconnect(&mut self, conn_id: u16, peripheral: &mut dyn PeripheralPort) {
        let clients = self.record.disconnected(conn_id);
        info!("device {} disconnected ({} remaining)", conn_id, clients);

        self.report(conn_id, MSG_DISCONNECTED, Some(clients));

        // Give the stack time to tear the link down before advertising.
        self.delay.delay_ms(self.disconnect_settle_ms);
        Self::readvertise(peripheral);
    }

    fn on_write(&mut self, conn_id: u16, value: &[u8], _peripheral: &mut dyn PeripheralPort) {
        info!(
            "client {} wrote {} bytes: {}",
            conn_id,
            value.len(),
            String::from_utf8_lossy(value)
        );
        // TODO: forward the written bytes once the backend message schema
        // for characteristic data is agreed; until then only the event is reported.
        let clients = self.record.clients();
        self.report(conn_id, MSG_WRITTEN, Some(clients));
    }

    fn on_read(&mut self, conn_id: u16) {
        info!("client {} read characteristic", conn_id);
    }
}
