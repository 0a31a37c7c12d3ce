//! MQTT-over-TLS status transport (AWS IoT style).
//!
//! The client authenticates with an X.509 device certificate, publishes
//! every status document to the publish topic at QoS 0 and subscribes to
//! the inbound topic.  Inbound messages are only logged.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`;
//!   a small thread pumps the connection's events and tracks liveness.
//! - **all other targets**: an in-memory broker with scripted availability.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::app::ports::{TransportError, TransportPort};
use crate::status::MAX_STATUS_BYTES;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, QoS};

/// Broker connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// Host name of the broker, without scheme.
    pub endpoint: String,
    pub port: u16,
    pub client_id: String,
    pub pub_topic: String,
    pub sub_topic: String,
}

impl MqttSettings {
    pub fn url(&self) -> String {
        format!("mqtts://{}:{}", self.endpoint, self.port)
    }
}

/// Log an inbound message.  Nothing else is done with it.
pub fn log_incoming(topic: &str, data: &[u8]) {
    info!("incoming: {} - {}", topic, String::from_utf8_lossy(data));
}

pub struct MqttTransport {
    settings: MqttSettings,
    /// Written by the event pump, read by the main loop.
    connected: Arc<AtomicBool>,
    subscribed: bool,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    /// Simulation: handshake attempts before the fake broker accepts.
    #[cfg(not(target_os = "espidf"))]
    sim_refusals: u32,
    /// Simulation: `(topic, payload)` pairs published so far.
    #[cfg(not(target_os = "espidf"))]
    sim_published: Vec<(String, Vec<u8>)>,
}

impl MqttTransport {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            connected: Arc::new(AtomicBool::new(false)),
            subscribed: false,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim_refusals: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_published: Vec::new(),
        }
    }

    pub fn settings(&self) -> &MqttSettings {
        &self.settings
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Simulation: refuse the next `n` connection checks.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_refuse_next(&mut self, n: u32) {
        self.sim_refusals = n;
    }

    /// Simulation: the broker drops or restores the session.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_link(&mut self, up: bool) {
        self.connected.store(up, Ordering::Relaxed);
    }

    /// Simulation: messages published so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_published(&self) -> &[(String, Vec<u8>)] {
        &self.sim_published
    }

    /// Simulation: deliver an inbound message as the broker would.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_deliver(&self, topic: &str, data: &[u8]) {
        if self.subscribed && topic == self.settings.sub_topic {
            log_incoming(topic, data);
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    /// Create the client once; the IDF client reconnects on its own after that.
    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), TransportError> {
        use esp_idf_svc::mqtt::client::{EventPayload, MqttClientConfiguration};
        use esp_idf_svc::tls::X509;

        use crate::config::secrets;

        if self.client.is_some() {
            return Ok(());
        }

        let url = self.settings.url();
        let config = MqttClientConfiguration {
            client_id: Some(self.settings.client_id.as_str()),
            server_certificate: Some(X509::pem_until_nul(secrets::MQTT_CA_PEM)),
            client_certificate: Some(X509::pem_until_nul(secrets::MQTT_CERT_PEM)),
            private_key: Some(X509::pem_until_nul(secrets::MQTT_KEY_PEM)),
            ..Default::default()
        };
        let (client, mut conn) = EspMqttClient::new_with_conn(&url, &config).map_err(|e| {
            warn!("MQTT(espidf): client setup failed: {}", e);
            TransportError::Connect
        })?;

        let connected = Arc::clone(&self.connected);
        std::thread::Builder::new()
            .name("mqtt-events".into())
            .stack_size(6 * 1024)
            .spawn(move || {
                while let Ok(event) = conn.next() {
                    match event.payload() {
                        EventPayload::Connected(_) => {
                            connected.store(true, Ordering::Relaxed);
                            info!("MQTT: broker connected");
                        }
                        EventPayload::Disconnected => {
                            connected.store(false, Ordering::Relaxed);
                            warn!("MQTT: broker disconnected");
                        }
                        EventPayload::Received { topic, data, .. } => {
                            log_incoming(topic.unwrap_or(""), data);
                        }
                        EventPayload::Error(e) => warn!("MQTT: {:?}", e),
                        _ => {}
                    }
                }
                connected.store(false, Ordering::Relaxed);
                info!("MQTT: connection closed");
            })
            .map_err(|_| TransportError::Connect)?;

        self.client = Some(client);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), TransportError> {
        if self.sim_refusals > 0 {
            self.sim_refusals -= 1;
            return Ok(());
        }
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .subscribe(&self.settings.sub_topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| TransportError::Subscribe)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        client
            .enqueue(&self.settings.pub_topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|_| TransportError::Publish)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.sim_published
            .push((self.settings.pub_topic.clone(), payload.to_vec()));
        Ok(())
    }
}

impl TransportPort for MqttTransport {
    /// Start the client, then subscribe once the broker has accepted us.
    /// Returns `NotConnected` while the session is still being set up so
    /// the caller's retry policy can poll.
    fn handshake(&mut self) -> Result<(), TransportError> {
        self.platform_start()?;
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if !self.subscribed {
            self.platform_subscribe()?;
            self.subscribed = true;
            info!("MQTT: subscribed to '{}'", self.settings.sub_topic);
        }
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        if payload.len() > MAX_STATUS_BYTES {
            return Err(TransportError::PayloadTooLarge);
        }
        self.platform_publish(payload)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}
