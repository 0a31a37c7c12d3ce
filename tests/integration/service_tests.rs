//! BridgeService lifecycle handlers against recording mocks.

use blebridge::app::ports::GattCallbacks;
use blebridge::app::service::{
    BridgeService, CONNECT_PLACEHOLDER, DEFAULT_DISCONNECT_SETTLE_MS, MSG_CONNECTED, MSG_DISCONNECTED,
    MSG_WRITTEN,
};

use crate::mocks::{MockRadio, RadioCall, RecordingTransport, SimTime};

type Service = BridgeService<RecordingTransport, SimTime, SimTime>;

fn make_service() -> (Service, SimTime) {
    let time = SimTime::default();
    let svc = BridgeService::new(
        RecordingTransport::new(),
        time.clone(),
        time.clone(),
        DEFAULT_DISCONNECT_SETTLE_MS,
    );
    (svc, time)
}

#[test]
fn connect_sets_and_notifies_placeholder_then_readvertises() {
    let (mut svc, _) = make_service();
    let mut radio = MockRadio::default();

    svc.on_connect(0, &mut radio);

    assert_eq!(
        radio.calls,
        [
            RadioCall::SetValue(CONNECT_PLACEHOLDER.to_vec()),
            RadioCall::Notify(CONNECT_PLACEHOLDER.to_vec()),
            RadioCall::Advertise,
        ]
    );
}

#[test]
fn status_documents_carry_time_conn_id_and_count() {
    let (mut svc, time) = make_service();
    let mut radio = MockRadio::default();

    time.advance(1_234);
    svc.on_connect(3, &mut radio);
    svc.on_connect(4, &mut radio);
    svc.on_disconnect(3, &mut radio);

    let msgs = svc.transport().messages();
    assert_eq!(msgs.len(), 3);

    assert_eq!(msgs[0]["time"], 1_234);
    assert_eq!(msgs[0]["device_id"], 3);
    assert_eq!(msgs[0]["message"], MSG_CONNECTED);
    assert_eq!(msgs[0]["clients"], 1);

    assert_eq!(msgs[1]["clients"], 2);

    assert_eq!(msgs[2]["device_id"], 3);
    assert_eq!(msgs[2]["message"], MSG_DISCONNECTED);
    assert_eq!(msgs[2]["clients"], 1);
}

#[test]
fn disconnect_reports_before_settle_delay() {
    let (mut svc, time) = make_service();
    let mut radio = MockRadio::default();

    svc.on_connect(1, &mut radio);
    let before = time.now();
    svc.on_disconnect(1, &mut radio);

    // The report is stamped before the settle wait runs.
    let msgs = svc.transport().messages();
    assert_eq!(msgs[1]["time"], before);
    assert_eq!(time.now(), before + u64::from(DEFAULT_DISCONNECT_SETTLE_MS));
    assert_eq!(radio.advertise_count(), 2);
}

#[test]
fn spurious_disconnect_keeps_counter_at_zero() {
    let (mut svc, _) = make_service();
    let mut radio = MockRadio::default();

    svc.on_disconnect(9, &mut radio);

    assert_eq!(svc.record().clients(), 0);
    assert_eq!(svc.record().spurious_disconnects(), 1);
    assert_eq!(svc.transport().messages()[0]["clients"], 0);
}

#[test]
fn write_reports_placeholder_message_only() {
    let (mut svc, _) = make_service();
    let mut radio = MockRadio::default();

    svc.on_connect(2, &mut radio);
    svc.on_write(2, b"temperature=21.5", &mut radio);

    let msgs = svc.transport().messages();
    assert_eq!(msgs[1]["message"], MSG_WRITTEN);
    assert_eq!(msgs[1]["device_id"], 2);
    assert!(!svc.transport().sent[1].contains("temperature"));
}

#[test]
fn read_is_logged_only() {
    let (mut svc, _) = make_service();
    svc.on_read(5);
    assert!(svc.transport().sent.is_empty());
    assert_eq!(svc.reporter().sent(), 0);
}

#[test]
fn backend_down_drops_messages_without_retry() {
    let (mut svc, _) = make_service();
    let mut radio = MockRadio::default();
    svc.transport_mut().up = false;

    svc.on_connect(1, &mut radio);
    svc.on_disconnect(1, &mut radio);

    assert_eq!(svc.reporter().dropped(), 2);
    assert_eq!(svc.reporter().sent(), 0);

    // Messages generated while down are lost, not queued.
    svc.transport_mut().up = true;
    svc.on_connect(2, &mut radio);
    assert_eq!(svc.transport().sent.len(), 1);
    assert_eq!(svc.record().clients(), 1);
}
