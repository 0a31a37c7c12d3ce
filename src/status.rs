//! Status messages forwarded to the backend.
//!
//! Every BLE lifecycle or characteristic event becomes one small JSON
//! document:
//!
//! ```text
//! {"time":<ms since boot>,"device_id":<conn id>,"message":"...","clients":<n>}
//! ```
//!
//! The document is serialized into a fixed 512-byte buffer and handed to
//! the active [`TransportPort`] exactly once.  Messages produced while the
//! backend is down are lost; nothing is queued or retried.

use core::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::adapters::utils::truncate_utf8;
use crate::app::ports::{TransportError, TransportPort};

/// Hard upper bound on a serialized status document.
pub const MAX_STATUS_BYTES: usize = 512;

/// Serialized status document, ready for the wire.
pub type StatusPayload = heapless::Vec<u8, MAX_STATUS_BYTES>;

// ───────────────────────────────────────────────────────────────
// Message
// ───────────────────────────────────────────────────────────────

/// One status report.  Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage<'a> {
    /// Milliseconds since boot.
    pub time: u64,
    /// BLE connection id the event belongs to.
    pub device_id: u16,
    /// Free-text description of the event.
    pub message: &'a str,
    /// Connected client count; omitted from the JSON when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<u32>,
}

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusError {
    /// serde_json refused the document.
    Serialize,
    /// The transport rejected the payload.
    Send(TransportError),
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize => write!(f, "JSON serialization failed"),
            Self::Send(e) => write!(f, "send failed: {e}"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Encoding
// ───────────────────────────────────────────────────────────────

/// Serialize `msg`, shortening its free text until the document fits in
/// [`MAX_STATUS_BYTES`].  The output is always complete, valid JSON.
pub fn encode(msg: &StatusMessage<'_>) -> Result<StatusPayload, StatusError> {
    let mut text = msg.message;
    loop {
        let candidate = StatusMessage { message: text, ..msg.clone() };
        let bytes = serde_json::to_vec(&candidate).map_err(|_| StatusError::Serialize)?;
        if bytes.len() <= MAX_STATUS_BYTES {
            if text.len() < msg.message.len() {
                warn!(
                    "STATUS | message truncated {} -> {} bytes to fit {} byte payload",
                    msg.message.len(),
                    text.len(),
                    MAX_STATUS_BYTES
                );
            }
            let mut payload = StatusPayload::new();
            payload
                .extend_from_slice(&bytes)
                .map_err(|_| StatusError::Serialize)?;
            return Ok(payload);
        }
        if text.is_empty() {
            return Err(StatusError::Serialize);
        }
        // Escaping never shrinks text, so dropping `excess` raw bytes
        // removes at least `excess` serialized bytes.
        let excess = bytes.len() - MAX_STATUS_BYTES;
        text = truncate_utf8(text, text.len().saturating_sub(excess.max(1)));
    }
}

// ───────────────────────────────────────────────────────────────
// Reporter
// ───────────────────────────────────────────────────────────────

/// Builds status documents and pushes them through the transport.
pub struct StatusReporter<T> {
    transport: T,
    sent: u32,
    dropped: u32,
}

impl<T: TransportPort> StatusReporter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            sent: 0,
            dropped: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Documents accepted by the transport.
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// Documents lost to transport or encoding failures.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Encode and send one status document.
    pub fn report(&mut self, msg: &StatusMessage<'_>) -> Result<(), StatusError> {
        let payload = match encode(msg) {
            Ok(p) => p,
            Err(e) => {
                self.dropped = self.dropped.saturating_add(1);
                return Err(e);
            }
        };
        debug!(
            "STATUS | posting via {}: {}",
            self.transport.name(),
            core::str::from_utf8(&payload).unwrap_or("<non-utf8>")
        );

        match self.transport.send(&payload) {
            Ok(()) => {
                self.sent = self.sent.saturating_add(1);
                Ok(())
            }
            Err(e) => {
                self.dropped = self.dropped.saturating_add(1);
                warn!("STATUS | '{}' lost: {}", msg.message, e);
                Err(StatusError::Send(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sink {
        fail: bool,
        payloads: Vec<Vec<u8>>,
    }

    impl TransportPort for Sink {
        fn handshake(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
        fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Request);
            }
            self.payloads.push(payload.to_vec());
            Ok(())
        }
        fn is_connected(&self) -> bool {
            !self.fail
        }
        fn name(&self) -> &'static str {
            "sink"
        }
    }

    fn msg(text: &str) -> StatusMessage<'_> {
        StatusMessage {
            time: 1234,
            device_id: 42,
            message: text,
            clients: Some(3),
        }
    }

    #[test]
    fn wire_format_matches_contract() {
        let payload = encode(&msg("device disconnected")).unwrap();
        assert_eq!(
            core::str::from_utf8(&payload).unwrap(),
            r#"{"time":1234,"device_id":42,"message":"device disconnected","clients":3}"#
        );
    }

    #[test]
    fn clients_field_omitted_when_absent() {
        let m = StatusMessage { clients: None, ..msg("boot") };
        let payload = encode(&m).unwrap();
        assert_eq!(
            core::str::from_utf8(&payload).unwrap(),
            r#"{"time":1234,"device_id":42,"message":"boot"}"#
        );
    }

    #[test]
    fn oversized_message_is_shortened_to_fit() {
        let long = "x".repeat(2000);
        let payload = encode(&msg(&long)).unwrap();
        assert!(payload.len() <= MAX_STATUS_BYTES);
        let v: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(v["clients"], 3);
        assert!(v["message"].as_str().unwrap().len() < long.len());
    }

    #[test]
    fn shortening_respects_utf8_and_escapes() {
        let long = "\u{00e9}\"\n".repeat(400);
        let payload = encode(&msg(&long)).unwrap();
        assert!(payload.len() <= MAX_STATUS_BYTES);
        assert!(serde_json::from_slice::<serde_json::Value>(&payload).is_ok());
    }

    #[test]
    fn reporter_counts_sent_and_dropped() {
        let mut r = StatusReporter::new(Sink { fail: false, payloads: Vec::new() });
        r.report(&msg("a")).unwrap();
        assert_eq!(r.sent(), 1);
        assert_eq!(r.transport().payloads.len(), 1);

        r.transport_mut().fail = true;
        assert_eq!(
            r.report(&msg("b")),
            Err(StatusError::Send(TransportError::Request))
        );
        assert_eq!(r.sent(), 1);
        assert_eq!(r.dropped(), 1);
    }
}
