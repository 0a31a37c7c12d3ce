//! HTTP(S) status transport.
//!
//! Every status document is one `POST` with `Content-Type:
//! application/json` to the configured URL.  The boot handshake posts a
//! fixed diagnostic body once.
//!
//! Liveness follows the last request: any HTTP response (even an error
//! status) means the server is reachable; a connect/write/read failure
//! means it is not.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::http::client::EspHttpConnection`
//!   with the ESP-IDF certificate bundle for HTTPS.
//! - **all other targets**: scripted responses and a request log for tests.

use log::{info, warn};

use crate::app::ports::{TransportError, TransportPort};
use crate::status::MAX_STATUS_BYTES;

#[cfg(target_os = "espidf")]
use embedded_svc::http::client::Client as HttpClient;
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::EspHttpConnection;

/// Diagnostic body posted once at boot.
pub const HANDSHAKE_BODY: &[u8] = br#"{"blahfasel": 42}"#;

pub struct HttpTransport {
    url: String,
    connected: bool,
    /// Lazily (re)created; dropped after a transport error so the next
    /// request starts from a fresh connection.
    #[cfg(target_os = "espidf")]
    client: Option<HttpClient<EspHttpConnection>>,
    /// Simulation: status the fake server answers with; `None` = unreachable.
    #[cfg(not(target_os = "espidf"))]
    sim_status: Option<u16>,
    /// Simulation: bodies received by the fake server.
    #[cfg(not(target_os = "espidf"))]
    sim_posts: Vec<Vec<u8>>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connected: false,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim_status: Some(200),
            #[cfg(not(target_os = "espidf"))]
            sim_posts: Vec::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Simulation: script the fake server's answer.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_respond_with(&mut self, status: Option<u16>) {
        self.sim_status = status;
    }

    /// Simulation: bodies posted so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_posts(&self) -> &[Vec<u8>] {
        &self.sim_posts
    }

    /// POST `body` and update liveness.  Status codes ≥ 400 are errors.
    fn post(&mut self, body: &[u8]) -> Result<u16, TransportError> {
        match self.platform_post(body) {
            Ok(status) => {
                self.connected = true;
                if status >= 400 {
                    warn!("HTTP: {} answered {}", self.url, status);
                    return Err(TransportError::Status(status));
                }
                Ok(status)
            }
            Err(e) => {
                if self.connected {
                    warn!("HTTP: {} unreachable: {}", self.url, e);
                }
                self.connected = false;
                Err(e)
            }
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_post(&mut self, body: &[u8]) -> Result<u16, TransportError> {
        use embedded_svc::io::{Read, Write};
        use esp_idf_svc::http::client::Configuration;

        let client = match self.client.as_mut() {
            Some(c) => c,
            None => {
                let conn = EspHttpConnection::new(&Configuration {
                    crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
                    ..Default::default()
                })
                .map_err(|e| {
                    warn!("HTTP(espidf): connection setup failed: {}", e);
                    TransportError::Connect
                })?;
                self.client.insert(HttpClient::wrap(conn))
            }
        };

        let content_length = body.len().to_string();
        let headers = [
            ("content-type", "application/json"),
            ("content-length", content_length.as_str()),
        ];

        let result = (|| -> Result<u16, TransportError> {
            let mut request = client.post(&self.url, &headers).map_err(|_| TransportError::Request)?;
            request.write_all(body).map_err(|_| TransportError::Request)?;
            request.flush().map_err(|_| TransportError::Request)?;
            let mut response = request.submit().map_err(|_| TransportError::Request)?;
            let status = response.status();

            // Drain the body so the connection can be reused.
            let mut buf = [0u8; 64];
            while let Ok(n) = response.read(&mut buf) {
                if n == 0 {
                    break;
                }
            }
            Ok(status)
        })();

        if result.is_err() {
            self.client = None;
        }
        result
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_post(&mut self, body: &[u8]) -> Result<u16, TransportError> {
        match self.sim_status {
            Some(status) => {
                self.sim_posts.push(body.to_vec());
                Ok(status)
            }
            None => Err(TransportError::Request),
        }
    }
}

impl TransportPort for HttpTransport {
    fn handshake(&mut self) -> Result<(), TransportError> {
        let status = self.post(HANDSHAKE_BODY)?;
        info!("HTTP Response code: {}", status);
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_STATUS_BYTES {
            return Err(TransportError::PayloadTooLarge);
        }
        self.post(payload).map(|_| ())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_posts_diagnostic_body() {
        let mut t = HttpTransport::new("https://example.com/status");
        assert!(!t.is_connected());
        t.handshake().unwrap();
        assert!(t.is_connected());
        assert_eq!(t.sim_posts(), [HANDSHAKE_BODY.to_vec()]);
    }

    #[test]
    fn error_status_is_reported_but_server_counts_as_up() {
        let mut t = HttpTransport::new("https://example.com/status");
        t.sim_respond_with(Some(503));
        assert_eq!(t.send(b"{}"), Err(TransportError::Status(503)));
        assert!(t.is_connected());
    }

    #[test]
    fn unreachable_server_drops_liveness() {
        let mut t = HttpTransport::new("https://example.com/status");
        t.send(b"{}").unwrap();
        assert!(t.is_connected());

        t.sim_respond_with(None);
        assert_eq!(t.send(b"{}"), Err(TransportError::Request));
        assert!(!t.is_connected());
    }

    #[test]
    fn oversized_payload_rejected_before_posting() {
        let mut t = HttpTransport::new("https://example.com/status");
        let big = vec![b'x'; MAX_STATUS_BYTES + 1];
        assert_eq!(t.send(&big), Err(TransportError::PayloadTooLarge));
        assert!(t.sim_posts().is_empty());
    }
}
