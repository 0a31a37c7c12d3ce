//! Edge-triggered backend liveness tracking for the main loop.

/// Direction of a liveness edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessChange {
    Connected,
    Disconnected,
}

/// Remembers the last observed transport liveness and reports only
/// transitions.  Starts out "disconnected", so a backend that is already
/// up at the first poll yields one `Connected` edge.
#[derive(Debug, Default)]
pub struct LivenessMonitor {
    last: bool,
    edges: u32,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, connected: bool) -> Option<LivenessChange> {
        if connected == self.last {
            return None;
        }
        self.last = connected;
        self.edges = self.edges.saturating_add(1);
        Some(if connected {
            LivenessChange::Connected
        } else {
            LivenessChange::Disconnected
        })
    }

    pub fn is_connected(&self) -> bool {
        self.last
    }

    /// Transitions seen so far.
    pub fn edges(&self) -> u32 {
        self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_while_state_is_unchanged() {
        let mut m = LivenessMonitor::new();
        assert_eq!(m.observe(false), None);
        assert_eq!(m.observe(false), None);
        assert_eq!(m.edges(), 0);
    }

    #[test]
    fn fires_once_per_edge() {
        let mut m = LivenessMonitor::new();
        assert_eq!(m.observe(true), Some(LivenessChange::Connected));
        assert_eq!(m.observe(true), None);
        assert_eq!(m.observe(false), Some(LivenessChange::Disconnected));
        assert_eq!(m.observe(false), None);
        assert_eq!(m.observe(true), Some(LivenessChange::Connected));
        assert_eq!(m.edges(), 3);
        assert!(m.is_connected());
    }
}
