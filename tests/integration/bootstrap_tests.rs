//! Connectivity bootstrap against the simulated Wi-Fi and backend adapters.

use blebridge::adapters::backend::BackendTransport;
use blebridge::adapters::http::{HANDSHAKE_BODY, HttpTransport};
use blebridge::adapters::mqtt::{MqttSettings, MqttTransport};
use blebridge::adapters::wifi::{ConnectivityError, ConnectivityPort, WifiAdapter};
use blebridge::app::ports::{TransportError, TransportPort};
use blebridge::bootstrap::{BootPolicies, Stage, bring_up};
use blebridge::config::{Backend, BridgeConfig, DEFAULT_PUB_TOPIC, DEFAULT_SUB_TOPIC};
use blebridge::error::Error;
use blebridge::retry::RetryPolicy;

use crate::mocks::SimTime;

fn wifi() -> WifiAdapter {
    let mut w = WifiAdapter::new(RetryPolicy::WIFI);
    w.set_credentials("HomeWiFi", "mysecret8").unwrap();
    w
}

fn mqtt_config() -> BridgeConfig {
    BridgeConfig {
        wifi_ssid: "HomeWiFi".into(),
        wifi_password: "mysecret8".into(),
        backend: Backend::Mqtt {
            endpoint: "abc-ats.iot.eu-west-1.amazonaws.com".into(),
            port: 8883,
            thing_name: "bridge-01".into(),
            pub_topic: DEFAULT_PUB_TOPIC.into(),
            sub_topic: DEFAULT_SUB_TOPIC.into(),
        },
        ..BridgeConfig::default()
    }
}

#[test]
fn http_handshake_posts_diagnostic_body_once() {
    let time = SimTime::default();
    let mut w = wifi();
    let mut http = HttpTransport::new("https://example.com/status");
    let policies = BootPolicies { wifi: RetryPolicy::WIFI, backend: RetryPolicy::BACKEND };

    let report = bring_up(&mut w, &mut http, policies, &time, &mut time.clone());

    assert!(report.is_online());
    assert_eq!(http.sim_posts(), [HANDSHAKE_BODY.to_vec()]);
}

#[test]
fn http_handshake_is_not_retried() {
    let config = BridgeConfig {
        backend: Backend::Http { url: "https://example.com/status".into() },
        ..BridgeConfig::default()
    };
    let mut transport = BackendTransport::from_config(&config);
    if let BackendTransport::Http(h) = &mut transport {
        h.sim_respond_with(None);
    }
    let policies = BootPolicies {
        wifi: config.wifi_retry,
        backend: transport.handshake_policy(&config),
    };
    let time = SimTime::default();
    let report = bring_up(&mut wifi(), &mut transport, policies, &time, &mut time.clone());

    assert_eq!(
        report.backend,
        Stage::Failed { attempts: 1, timed_out: false, error: Error::Transport(TransportError::Request) }
    );
    assert_eq!(time.now(), 0, "no backoff after a single attempt");
}

#[test]
fn mqtt_connect_polled_until_broker_accepts() {
    let config = mqtt_config();
    let mut transport = BackendTransport::from_config(&config);
    if let BackendTransport::Mqtt(m) = &mut transport {
        m.sim_refuse_next(3);
    }
    let policies = BootPolicies {
        wifi: config.wifi_retry,
        backend: transport.handshake_policy(&config),
    };
    let time = SimTime::default();
    let report = bring_up(&mut wifi(), &mut transport, policies, &time, &mut time.clone());

    assert_eq!(report.backend, Stage::Up { attempts: 4 });
    // 100 + 200 + 400 ms of backoff between the four attempts.
    assert_eq!(time.now(), 700);
    assert!(transport.is_connected());
    match &transport {
        BackendTransport::Mqtt(m) => {
            assert!(m.is_subscribed());
            assert_eq!(m.settings().client_id, "bridge-01");
        }
        BackendTransport::Http(_) => panic!("expected mqtt"),
    }
}

#[test]
fn mqtt_timeout_leaves_firmware_running() {
    let config = BridgeConfig {
        backend_retry: RetryPolicy {
            max_attempts: 100,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 1_000,
            timeout_ms: 5_000,
        },
        ..mqtt_config()
    };
    let mut transport = BackendTransport::from_config(&config);
    if let BackendTransport::Mqtt(m) = &mut transport {
        m.sim_refuse_next(u32::MAX);
    }
    let policies = BootPolicies {
        wifi: config.wifi_retry,
        backend: transport.handshake_policy(&config),
    };
    let time = SimTime::default();
    let report = bring_up(&mut wifi(), &mut transport, policies, &time, &mut time.clone());

    match report.backend {
        Stage::Failed { timed_out, error, .. } => {
            assert!(timed_out);
            assert_eq!(error, Error::Transport(TransportError::NotConnected));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(time.now(), 5_000, "backoff never overshoots the budget");
}

#[test]
fn missing_credentials_fail_wifi_and_skip_backend() {
    let mut w = WifiAdapter::new(RetryPolicy::WIFI);
    let mut mqtt = MqttTransport::new(MqttSettings {
        endpoint: "broker.example".into(),
        port: 8883,
        client_id: "esp32-efcafe".into(),
        pub_topic: DEFAULT_PUB_TOPIC.into(),
        sub_topic: DEFAULT_SUB_TOPIC.into(),
    });
    let policies = BootPolicies {
        wifi: RetryPolicy { max_attempts: 2, initial_backoff_ms: 10, max_backoff_ms: 10, timeout_ms: 0 },
        backend: RetryPolicy::BACKEND,
    };
    let time = SimTime::default();
    let report = bring_up(&mut w, &mut mqtt, policies, &time, &mut time.clone());

    assert_eq!(
        report.wifi,
        Stage::Failed { attempts: 2, timed_out: false, error: Error::Wifi(ConnectivityError::NoCredentials) }
    );
    assert_eq!(report.backend, Stage::Skipped);
    assert!(!mqtt.is_connected());
}
