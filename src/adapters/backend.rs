//! Backend selection.
//!
//! [`BackendTransport`] wraps whichever transport the configuration asks
//! for, so the service and the bootstrap stay monomorphic over one type.

use crate::adapters::device_id;
use crate::adapters::http::HttpTransport;
use crate::adapters::mqtt::{MqttSettings, MqttTransport};
use crate::app::ports::{TransportError, TransportPort};
use crate::config::{Backend, BridgeConfig};
use crate::retry::RetryPolicy;

pub enum BackendTransport {
    Http(HttpTransport),
    Mqtt(MqttTransport),
}

impl BackendTransport {
    /// Build the transport named by `config.backend`.  An empty MQTT thing
    /// name falls back to the MAC-derived one.
    pub fn from_config(config: &BridgeConfig) -> Self {
        match &config.backend {
            Backend::Http { url } => Self::Http(HttpTransport::new(url.clone())),
            Backend::Mqtt { endpoint, port, thing_name, pub_topic, sub_topic } => {
                let client_id = if thing_name.is_empty() {
                    device_id::thing_name(&device_id::read_mac()).as_str().into()
                } else {
                    thing_name.clone()
                };
                Self::Mqtt(MqttTransport::new(MqttSettings {
                    endpoint: endpoint.clone(),
                    port: *port,
                    client_id,
                    pub_topic: pub_topic.clone(),
                    sub_topic: sub_topic.clone(),
                }))
            }
        }
    }

    /// Retry policy for the boot handshake.  HTTP posts exactly once;
    /// MQTT polls the broker session under `config.backend_retry`.
    pub fn handshake_policy(&self, config: &BridgeConfig) -> RetryPolicy {
        match self {
            Self::Http(_) => RetryPolicy { max_attempts: 1, ..config.backend_retry },
            Self::Mqtt(_) => config.backend_retry,
        }
    }
}

impl TransportPort for BackendTransport {
    fn handshake(&mut self) -> Result<(), TransportError> {
        match self {
            Self::Http(t) => t.handshake(),
            Self::Mqtt(t) => t.handshake(),
        }
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        match self {
            Self::Http(t) => t.send(payload),
            Self::Mqtt(t) => t.send(payload),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Self::Http(t) => t.is_connected(),
            Self::Mqtt(t) => t.is_connected(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Http(t) => t.name(),
            Self::Mqtt(t) => t.name(),
        }
    }
}
