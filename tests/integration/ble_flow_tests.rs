//! End-to-end: simulated BLE stack events → queue → BridgeService → backend.

use blebridge::adapters::ble::BleAdapter;
use blebridge::adapters::mqtt::{MqttSettings, MqttTransport};
use blebridge::adapters::wifi::{ConnectivityPort, WifiAdapter, WifiState};
use blebridge::app::ports::{PeripheralPort, PeripheralState, TransportPort};
use blebridge::app::service::{BridgeService, CONNECT_PLACEHOLDER, MSG_CONNECTED, MSG_WRITTEN};
use blebridge::events::EVENT_QUEUE_DEPTH;
use blebridge::liveness::{LivenessChange, LivenessMonitor};
use blebridge::retry::RetryPolicy;

use crate::mocks::{RecordingTransport, SimTime, leaked_queue};

fn started_ble() -> BleAdapter {
    let mut ble = BleAdapter::new(leaked_queue());
    ble.start().unwrap();
    ble
}

#[test]
fn two_centrals_connect_write_and_leave() {
    let time = SimTime::default();
    let mut ble = started_ble();
    let mut svc = BridgeService::new(RecordingTransport::new(), time.clone(), time.clone(), 500);

    ble.sim_connect(0);
    ble.sim_connect(1);
    assert_eq!(ble.process_pending(&mut svc), 2);
    assert_eq!(ble.state(), PeripheralState::Connected { links: 2 });
    assert_eq!(svc.record().clients(), 2);
    assert_eq!(ble.sim_notified(), [CONNECT_PLACEHOLDER.to_vec(), CONNECT_PLACEHOLDER.to_vec()]);
    assert_eq!(ble.sim_value(), CONNECT_PLACEHOLDER);

    ble.sim_write(1, b"hello");
    ble.sim_disconnect(0);
    ble.sim_disconnect(1);
    assert_eq!(ble.process_pending(&mut svc), 3);

    assert_eq!(ble.state(), PeripheralState::Advertising);
    assert_eq!(svc.record().clients(), 0);

    let clients: Vec<_> = svc.transport().messages().iter().map(|m| m["clients"].clone()).collect();
    assert_eq!(clients, [1, 2, 2, 1, 0]);
}

#[test]
fn readvertising_is_idempotent_while_beacon_is_on() {
    let time = SimTime::default();
    let mut ble = started_ble();
    let mut svc = BridgeService::new(RecordingTransport::new(), time.clone(), time.clone(), 500);
    assert_eq!(ble.sim_advertise_starts(), 1);

    // Connect stops the beacon, the handler restarts it once.
    ble.sim_connect(0);
    ble.process_pending(&mut svc);
    assert_eq!(ble.sim_advertise_starts(), 2);

    // Disconnect while still advertising: restart is a no-op.
    ble.sim_disconnect(0);
    ble.process_pending(&mut svc);
    assert_eq!(ble.sim_advertise_starts(), 2);
    assert_eq!(ble.state(), PeripheralState::Advertising);
}

#[test]
fn burst_beyond_queue_depth_drops_newest() {
    let time = SimTime::default();
    let mut ble = started_ble();
    let mut svc = BridgeService::new(RecordingTransport::new(), time.clone(), time.clone(), 0);

    let accepted = (0..EVENT_QUEUE_DEPTH as u16 + 4).filter(|i| ble.sim_read(*i)).count();
    assert_eq!(accepted, EVENT_QUEUE_DEPTH);
    assert_eq!(ble.process_pending(&mut svc), EVENT_QUEUE_DEPTH);
    assert_eq!(ble.process_pending(&mut svc), 0);
}

#[test]
fn mqtt_backend_publishes_status_and_logs_inbound() {
    let time = SimTime::default();
    let mut mqtt = MqttTransport::new(MqttSettings {
        endpoint: "broker.example".into(),
        port: 8883,
        client_id: "esp32-efcafe".into(),
        pub_topic: "thing/esp32/pub".into(),
        sub_topic: "thing/esp32/sub".into(),
    });
    mqtt.handshake().unwrap();

    let mut ble = started_ble();
    let mut svc = BridgeService::new(mqtt, time.clone(), time.clone(), 500);
    let mut liveness = LivenessMonitor::new();
    assert_eq!(liveness.observe(svc.transport().is_connected()), Some(LivenessChange::Connected));

    ble.sim_connect(7);
    ble.process_pending(&mut svc);

    let published = svc.transport().sim_published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "thing/esp32/pub");
    let doc: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
    assert_eq!(doc["device_id"], 7);
    assert_eq!(doc["message"], "new device connected");

    svc.transport().sim_deliver("thing/esp32/sub", b"{\"cmd\":\"noop\"}");

    // Broker drops the session: the next status is lost and the loop sees one edge.
    svc.transport_mut().sim_set_link(false);
    assert_eq!(liveness.observe(svc.transport().is_connected()), Some(LivenessChange::Disconnected));
    assert_eq!(liveness.observe(svc.transport().is_connected()), None);

    ble.sim_disconnect(7);
    ble.process_pending(&mut svc);
    assert_eq!(svc.transport().sim_published().len(), 1);
    assert_eq!(svc.reporter().dropped(), 1);
}

#[test]
fn long_write_reports_once_after_execute() {
    let time = SimTime::default();
    let mut ble = started_ble();
    let mut svc = BridgeService::new(RecordingTransport::new(), time.clone(), time.clone(), 500);

    ble.sim_connect(3);
    let text = [b'w'; 200];
    for (i, chunk) in text.chunks(22).enumerate() {
        ble.sim_prepare_write(3, (i * 22) as u16, chunk).unwrap();
    }
    assert_eq!(ble.process_pending(&mut svc), 1);

    assert!(ble.sim_execute_write(3, false));
    assert_eq!(ble.process_pending(&mut svc), 1);

    let messages: Vec<_> = svc.transport().messages().iter().map(|m| m["message"].clone()).collect();
    assert_eq!(messages, [MSG_CONNECTED, MSG_WRITTEN]);
}

#[test]
fn loop_keeps_draining_while_wifi_reassociates() {
    let time = SimTime::default();
    let mut ble = started_ble();
    let mut svc = BridgeService::new(RecordingTransport::new(), time.clone(), time.clone(), 500);
    let mut wifi = WifiAdapter::new(RetryPolicy::WIFI);
    wifi.set_credentials("HomeWiFi", "mysecret8").unwrap();
    wifi.connect().unwrap();
    wifi.sim_drop_link();
    wifi.sim_hold_association(u32::MAX);

    ble.sim_connect(1);
    for i in 0..2 * EVENT_QUEUE_DEPTH {
        assert!(ble.sim_read(1), "event dropped on pass {i}");
        ble.process_pending(&mut svc);
        wifi.poll(time.now());
        time.advance(100);
    }
    assert!(matches!(wifi.state(), WifiState::Associating { .. }));

    assert!(ble.sim_disconnect(1));
    ble.process_pending(&mut svc);
    assert_eq!(svc.record().clients(), 0);
}
