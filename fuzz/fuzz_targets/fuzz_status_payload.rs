//! Fuzz target: `status::encode`
//!
//! Feeds arbitrary header fields and free text into the status document
//! builder and asserts that it never panics, never exceeds the 512-byte
//! payload, and always yields parseable JSON whose message is a prefix
//! of the input.
//!
//! cargo fuzz run fuzz_status_payload

#![no_main]

use blebridge::status::{MAX_STATUS_BYTES, StatusMessage, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 15 {
        return;
    }
    let (head, text) = data.split_at(15);
    let time = u64::from_le_bytes(head[0..8].try_into().unwrap());
    let device_id = u16::from_le_bytes([head[8], head[9]]);
    let clients = (head[10] & 1 == 1).then(|| u32::from_le_bytes(head[11..15].try_into().unwrap()));
    let message = String::from_utf8_lossy(text);

    let msg = StatusMessage { time, device_id, message: &message, clients };
    let payload = encode(&msg).expect("header alone always fits");
    assert!(payload.len() <= MAX_STATUS_BYTES);

    let doc: serde_json::Value = serde_json::from_slice(&payload).expect("valid JSON");
    let sent = doc["message"].as_str().expect("message is a string");
    assert!(message.starts_with(sent));
});
