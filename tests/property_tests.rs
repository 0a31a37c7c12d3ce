//! Property tests for the bridge invariants.
//!
//! Runs on host (x86_64) only; proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use blebridge::app::state::ConnectionRecord;
use blebridge::liveness::{LivenessChange, LivenessMonitor};
use blebridge::retry::RetryPolicy;
use blebridge::status::{MAX_STATUS_BYTES, StatusMessage, encode};
use proptest::prelude::*;

proptest! {
    /// The client counter equals connects minus disconnects, never going
    /// below zero; every disconnect at zero is counted as spurious.
    #[test]
    fn counter_tracks_connects_minus_disconnects(
        ops in proptest::collection::vec(any::<bool>(), 0..200),
    ) {
        let mut record = ConnectionRecord::new();
        let mut expected: u32 = 0;
        let mut spurious: u32 = 0;

        for (i, connect) in ops.iter().enumerate() {
            let id = i as u16;
            if *connect {
                expected += 1;
                prop_assert_eq!(record.connected(id), expected);
            } else {
                if expected == 0 {
                    spurious += 1;
                } else {
                    expected -= 1;
                }
                prop_assert_eq!(record.disconnected(id), expected);
            }
            prop_assert_eq!(record.conn_id(), id);
        }

        prop_assert_eq!(record.clients(), expected);
        prop_assert_eq!(record.spurious_disconnects(), spurious);
    }

    /// Exactly one change per transition of the observed flag, and the
    /// reported direction always matches the new value.
    #[test]
    fn liveness_fires_once_per_edge(
        samples in proptest::collection::vec(any::<bool>(), 0..200),
    ) {
        let mut monitor = LivenessMonitor::new();
        let mut prev = false;
        let mut expected_edges = 0u32;

        for s in samples {
            let change = monitor.observe(s);
            if s == prev {
                prop_assert_eq!(change, None);
            } else {
                expected_edges += 1;
                let want = if s { LivenessChange::Connected } else { LivenessChange::Disconnected };
                prop_assert_eq!(change, Some(want));
            }
            prev = s;
        }
        prop_assert_eq!(monitor.edges(), expected_edges);
    }

    /// Whatever the message, the document fits the buffer and stays valid JSON
    /// with the numeric fields intact.
    #[test]
    fn status_payload_is_bounded_valid_json(
        message in ".{0,700}",
        time in any::<u64>(),
        device_id in any::<u16>(),
        clients in proptest::option::of(any::<u32>()),
    ) {
        let msg = StatusMessage { time, device_id, message: &message, clients };
        let payload = encode(&msg).unwrap();
        prop_assert!(payload.len() <= MAX_STATUS_BYTES);

        let doc: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        prop_assert_eq!(doc["time"].as_u64(), Some(time));
        prop_assert_eq!(doc["device_id"].as_u64(), Some(u64::from(device_id)));
        prop_assert_eq!(doc["clients"].as_u64(), clients.map(u64::from));

        let sent = doc["message"].as_str().unwrap();
        prop_assert!(message.starts_with(sent), "message may only be shortened");
    }

    /// Backoff is monotonic in the attempt number and never exceeds the cap.
    #[test]
    fn backoff_is_monotonic_and_capped(
        initial in 1u32..10_000,
        cap in 1u32..100_000,
        attempt in 1u32..64,
    ) {
        let policy = RetryPolicy { max_attempts: 10, initial_backoff_ms: initial, max_backoff_ms: cap, timeout_ms: 0 };
        let a = policy.backoff_for(attempt);
        let b = policy.backoff_for(attempt + 1);
        prop_assert!(a <= b);
        prop_assert!(b <= cap);
    }
}
