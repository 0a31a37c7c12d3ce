//! Fuzz target: BLE event stream → `ConnectionRecord`
//!
//! Interprets each input byte as a connect / disconnect / write / read
//! for one of 16 connection ids, drives the simulated adapter through the
//! bridge service and checks that the client counter stays between zero
//! and the number of connects seen.
//!
//! cargo fuzz run fuzz_ble_events

#![no_main]

use blebridge::adapters::ble::BleAdapter;
use blebridge::app::ports::{ClockPort, TransportError, TransportPort};
use blebridge::app::service::BridgeService;
use blebridge::events::EventQueue;
use embedded_hal::delay::DelayNs;
use libfuzzer_sys::fuzz_target;

struct Null;

impl TransportPort for Null {
    fn handshake(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
    fn send(&mut self, _payload: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
    fn is_connected(&self) -> bool {
        true
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

struct Zero;

impl ClockPort for Zero {
    fn uptime_ms(&self) -> u64 {
        0
    }
}

impl DelayNs for Zero {
    fn delay_ns(&mut self, _ns: u32) {}
}

static QUEUE: EventQueue = EventQueue::new();

fuzz_target!(|data: &[u8]| {
    let mut ble = BleAdapter::new(&QUEUE);
    ble.start().expect("sim start");
    let mut svc = BridgeService::new(Null, Zero, Zero, 0);

    let mut connects = 0u32;
    for byte in data {
        let conn_id = u16::from(byte >> 4);
        match byte & 0x03 {
            0 => {
                connects += 1;
                ble.sim_connect(conn_id)
            }
            1 => ble.sim_disconnect(conn_id),
            2 => ble.sim_write(conn_id, &[*byte]),
            _ => ble.sim_read(conn_id),
        };
        ble.process_pending(&mut svc);
        assert!(svc.record().clients() <= connects);
    }
});
