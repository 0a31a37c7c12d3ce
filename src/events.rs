//! BLE event queue.
//!
//! GATT callbacks run inside the Bluedroid task.  They never touch the
//! bridge state directly: each callback turns into a [`BleEvent`] pushed
//! onto a bounded static channel, and the main loop drains the channel
//! and dispatches into the service one event at a time.
//!
//! ```text
//! ┌────────────────┐   BleEvent    ┌──────────────┐
//! │ Bluedroid task │──────────────▶│  Main Loop   │
//! │ (GATT/GAP cb)  │  (bounded 16) │  (consumer)  │
//! └────────────────┘               └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use log::warn;

use crate::status::MAX_STATUS_BYTES;

/// Longest characteristic write carried through the queue.
pub const MAX_WRITE_LEN: usize = MAX_STATUS_BYTES;

/// Pending events before producers start dropping.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// One BLE stack notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    Connected { conn_id: u16 },
    Disconnected { conn_id: u16 },
    Written { conn_id: u16, value: Vec<u8, MAX_WRITE_LEN> },
    Read { conn_id: u16 },
}

impl BleEvent {
    /// Build a write event, keeping at most [`MAX_WRITE_LEN`] bytes.
    pub fn written(conn_id: u16, data: &[u8]) -> Self {
        let keep = data.len().min(MAX_WRITE_LEN);
        if keep < data.len() {
            warn!("BLE: write of {} bytes truncated to {}", data.len(), keep);
        }
        let mut value = Vec::new();
        // Cannot fail: `keep` is bounded by the capacity.
        let _ = value.extend_from_slice(&data[..keep]);
        Self::Written { conn_id, value }
    }

    pub fn conn_id(&self) -> u16 {
        match self {
            Self::Connected { conn_id }
            | Self::Disconnected { conn_id }
            | Self::Written { conn_id, .. }
            | Self::Read { conn_id } => *conn_id,
        }
    }
}

/// Bounded queue from BLE callbacks to the main loop.
pub type EventQueue = Channel<CriticalSectionRawMutex, BleEvent, EVENT_QUEUE_DEPTH>;

/// Process-wide BLE event queue.
pub static BLE_EVENTS: EventQueue = Channel::new();

/// Enqueue from a BLE callback.  Never blocks; a full queue drops the
/// event with a warning and returns `false`.
pub fn push_event(queue: &EventQueue, event: BleEvent) -> bool {
    match queue.try_send(event) {
        Ok(()) => true,
        Err(embassy_sync::channel::TrySendError::Full(dropped)) => {
            warn!("BLE: event queue full, dropping {:?}", dropped);
            false
        }
    }
}

/// Take every pending event, oldest first, handing each to `f`.
/// Returns how many were processed.
pub fn drain_events(queue: &EventQueue, mut f: impl FnMut(BleEvent)) -> usize {
    let mut n = 0;
    while let Ok(event) = queue.try_receive() {
        f(event);
        n += 1;
    }
    n
}
