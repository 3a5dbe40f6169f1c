//! Fixed events and the digests recorded for them by chains persisted before
//! this crate existed.  Any change to canonical encoding shows up here.

use serde_json::{json, Map, Value};

use proctorchain_contracts::{
    block::{Block, GENESIS_PREVIOUS_HASH},
    event::{CheatingEvent, Severity},
};

pub const CANONICAL_FIRST_EVENT: &str = concat!(
    r#"{"confidence_score": 0.87, "description": "Head misalignment detected: left", "#,
    r#""event_id": "evt-1", "event_type": "head_misalignment", "#,
    r#""metadata": {"angle": 12.5, "frames": 3, "label": "caf\u00e9"}, "#,
    r#""screenshot_path": null, "session_id": "session-a", "severity": "high", "#,
    r#""timestamp": 1700000000.25, "user_id": null}"#
);

pub const CANONICAL_THIRD_EVENT: &str = concat!(
    r#"{"confidence_score": 1e-05, "description": "Lip \"quoted\"\nline", "#,
    r#""event_id": "evt-3", "event_type": "lip_movement", "#,
    r#""metadata": {"big": 1e+16, "nested": {"z": [1, 2.0, null, true]}}, "#,
    r#""screenshot_path": null, "session_id": "session-b", "severity": "medium", "#,
    r#""timestamp": 1700000002.0, "user_id": null}"#
);

pub const ROOT_OF_FIRST_EVENT: &str =
    "b38bdda9061cb7cb0cfc70bc14af7f9e2b10f1f233f52306af489aa5aff21088";

pub const ROOT_OF_SAMPLE_EVENTS: &str =
    "62510b54a4d949edbe6fe904222f669b5194585c09460d5dd67ba13eb4cc1e0e";

pub const HASH_OF_SAMPLE_BLOCK: &str =
    "96224930037432ea392dcb59267ffb074403c49ce7bc0765c054bbf7e1a38b42";

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn sample_events() -> Vec<CheatingEvent> {
    vec![
        CheatingEvent {
            event_id: "evt-1".to_string(),
            timestamp: 1700000000.25,
            event_type: "head_misalignment".to_string(),
            severity: Severity::High,
            description: "Head misalignment detected: left".to_string(),
            confidence_score: 0.87,
            screenshot_path: None,
            metadata: object(json!({ "angle": 12.5, "frames": 3, "label": "caf\u{e9}" })),
            session_id: "session-a".to_string(),
            user_id: None,
        },
        CheatingEvent {
            event_id: "evt-2".to_string(),
            timestamp: 1700000001.5,
            event_type: "mobile_detection".to_string(),
            severity: Severity::Critical,
            description: "Mobile device detected during exam".to_string(),
            confidence_score: 0.95,
            screenshot_path: Some("/tmp/shot.png".to_string()),
            metadata: Map::new(),
            session_id: "session-a".to_string(),
            user_id: Some("student-7".to_string()),
        },
        CheatingEvent {
            event_id: "evt-3".to_string(),
            timestamp: 1700000002.0,
            event_type: "lip_movement".to_string(),
            severity: Severity::Medium,
            description: "Lip \"quoted\"\nline".to_string(),
            confidence_score: 1e-5,
            screenshot_path: None,
            metadata: object(json!({ "big": 1e16, "nested": { "z": [1, 2.0, null, true] } })),
            session_id: "session-b".to_string(),
            user_id: None,
        },
    ]
}

/// Block 1 over the sample events with a fixed timestamp and nonce.
pub fn sample_block() -> Block {
    Block {
        index: 1,
        timestamp: 1700000005.125,
        events: sample_events(),
        previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        merkle_root: ROOT_OF_SAMPLE_EVENTS.to_string(),
        nonce: 42,
    }
}
