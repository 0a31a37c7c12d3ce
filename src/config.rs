//! Bridge configuration.
//!
//! Secrets (Wi-Fi credentials, server URL, broker endpoint, TLS material)
//! are compiled in: `build.rs` loads `.env` and exports them as
//! `BRIDGE_*` environment variables.  Everything else has a sane
//! [`Default`] and is checked by [`BridgeConfig::validate`] before the
//! firmware touches a radio.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Values injected by `build.rs`.  Unset variables are empty strings and
/// missing PEM files are a lone NUL byte.
pub mod secrets {
    pub const WIFI_SSID: &str = env!("BRIDGE_WIFI_SSID");
    pub const WIFI_PASSWORD: &str = env!("BRIDGE_WIFI_PASSWORD");
    pub const SERVER_URL: &str = env!("BRIDGE_SERVER_URL");
    pub const BACKEND: &str = env!("BRIDGE_BACKEND");
    pub const MQTT_ENDPOINT: &str = env!("BRIDGE_MQTT_ENDPOINT");
    pub const MQTT_THING_NAME: &str = env!("BRIDGE_MQTT_THING_NAME");

    /// Amazon root CA, NUL-terminated PEM.
    pub static MQTT_CA_PEM: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mqtt_ca.pem"));
    /// Device certificate, NUL-terminated PEM.
    pub static MQTT_CERT_PEM: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mqtt_cert.pem"));
    /// Device private key, NUL-terminated PEM.
    pub static MQTT_KEY_PEM: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mqtt_key.pem"));
}

pub const DEFAULT_PUB_TOPIC: &str = "thing/esp32/pub";
pub const DEFAULT_SUB_TOPIC: &str = "thing/esp32/sub";
pub const DEFAULT_MQTT_PORT: u16 = 8883;

/// Where status documents go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backend {
    /// HTTPS POST of every document to `url`.
    Http { url: String },
    /// MQTT over TLS with X.509 client authentication.
    Mqtt {
        endpoint: String,
        port: u16,
        /// Client id; empty means "derive from the MAC".
        thing_name: String,
        pub_topic: String,
        sub_topic: String,
    },
}

impl Backend {
    /// Select the backend from its build-time name (`"http"` or `"mqtt"`,
    /// empty defaults to HTTP).
    pub fn from_kind(kind: &str, server_url: &str, endpoint: &str, thing_name: &str) -> Result<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "" | "http" => Ok(Self::Http { url: server_url.into() }),
            "mqtt" => Ok(Self::Mqtt {
                endpoint: endpoint.into(),
                port: DEFAULT_MQTT_PORT,
                thing_name: thing_name.into(),
                pub_topic: DEFAULT_PUB_TOPIC.into(),
                sub_topic: DEFAULT_SUB_TOPIC.into(),
            }),
            _ => Err(Error::Config("BRIDGE_BACKEND must be 'http' or 'mqtt'")),
        }
    }
}

/// Log verbosity; mirrors `log::LevelFilter` so the config stays serde-friendly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    // --- Wi-Fi ---
    pub wifi_ssid: String,
    /// Empty for an open network.
    pub wifi_password: String,
    pub wifi_retry: RetryPolicy,

    // --- Backend ---
    pub backend: Backend,
    /// Applies to the MQTT broker connect; HTTP handshakes once.
    pub backend_retry: RetryPolicy,

    // --- BLE ---
    /// Wait after a disconnect before re-advertising.
    pub disconnect_settle_ms: u32,

    // --- Main loop ---
    pub loop_interval_ms: u32,
    pub log_level: LogLevel,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            wifi_retry: RetryPolicy::WIFI,

            backend: Backend::Http { url: String::new() },
            backend_retry: RetryPolicy::BACKEND,

            disconnect_settle_ms: 500,

            loop_interval_ms: 10,
            log_level: LogLevel::Debug,
        }
    }
}

impl BridgeConfig {
    /// Defaults plus the secrets compiled in by `build.rs`.
    pub fn from_build_env() -> Result<Self> {
        Ok(Self {
            wifi_ssid: secrets::WIFI_SSID.into(),
            wifi_password: secrets::WIFI_PASSWORD.into(),
            backend: Backend::from_kind(
                secrets::BACKEND,
                secrets::SERVER_URL,
                secrets::MQTT_ENDPOINT,
                secrets::MQTT_THING_NAME,
            )?,
            ..Self::default()
        })
    }

    /// Reject configurations the firmware cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.wifi_ssid.is_empty() {
            return Err(Error::Config("wifi ssid not set"));
        }
        if self.loop_interval_ms == 0 {
            return Err(Error::Config("loop interval must be non-zero"));
        }
        if self.wifi_retry.max_attempts == 0 || self.backend_retry.max_attempts == 0 {
            return Err(Error::Config("retry policy needs at least one attempt"));
        }
        match &self.backend {
            Backend::Http { url } => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(Error::Config("server url must start with http:// or https://"));
                }
            }
            Backend::Mqtt { endpoint, port, pub_topic, sub_topic, .. } => {
                if endpoint.is_empty() {
                    return Err(Error::Config("mqtt endpoint not set"));
                }
                if *port == 0 {
                    return Err(Error::Config("mqtt port must be non-zero"));
                }
                if pub_topic.is_empty() || sub_topic.is_empty() {
                    return Err(Error::Config("mqtt topics must be non-empty"));
                }
            }
        }
        Ok(())
    }
}
