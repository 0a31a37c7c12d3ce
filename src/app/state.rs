//! Connection bookkeeping shared by the GATT lifecycle handlers.

use log::warn;

/// Process-wide record of BLE client activity.
///
/// Owned by [`BridgeService`](super::service::BridgeService) and mutated
/// only from the main loop, which drains BLE events one at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Connection id of the most recent connect/disconnect event.
    conn_id: u16,
    /// Centrals currently believed connected.
    clients: u32,
    /// Disconnects observed while `clients` was already zero.
    spurious_disconnects: u32,
}

impl ConnectionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conn_id(&self) -> u16 {
        self.conn_id
    }

    pub fn clients(&self) -> u32 {
        self.clients
    }

    pub fn spurious_disconnects(&self) -> u32 {
        self.spurious_disconnects
    }

    /// Record a new link.  Returns the updated client count.
    pub fn connected(&mut self, conn_id: u16) -> u32 {
        self.conn_id = conn_id;
        self.clients = self.clients.saturating_add(1);
        self.clients
    }

    /// Record a dropped link.  Returns the updated client count.
    ///
    /// The count never goes below zero: a disconnect with no recorded
    /// client is counted as spurious and logged.
    pub fn disconnected(&mut self, conn_id: u16) -> u32 {
        self.conn_id = conn_id;
        if self.clients == 0 {
            self.spurious_disconnects = self.spurious_disconnects.saturating_add(1);
            warn!(
                "BLE: disconnect of conn {} with no recorded client (spurious #{})",
                conn_id, self.spurious_disconnects
            );
        } else {
            self.clients -= 1;
        }
        self.clients
    }
}
