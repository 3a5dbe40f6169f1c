//! # proctorchain-session
//!
//! The producer side of the proctorchain ledger: one [`ProctorSession`] per
//! exam sitting turns detector output (head pose, gaze, phone, lips,
//! emotion) into ledger events with consistent types, descriptions, and
//! severities.

pub mod session;

pub use session::{EmotionFlags, Evidence, ProctorSession};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proctorchain_contracts::{export::SessionExport, CheatingEvent, Severity};
    use proctorchain_crypto::{KeyPair, RsaPssSigner};
    use proctorchain_ledger::{export::read_document, Ledger, LedgerSettings};
    use proctorchain_store::SqliteBlockStore;

    use super::*;

    const TEST_KEY: &str = include_str!("../../../testdata/signing_key.pem");

    fn ledger() -> Arc<Ledger> {
        let signer = RsaPssSigner::new(&KeyPair::from_pkcs8_pem(TEST_KEY).unwrap());
        let ledger = Ledger::new(
            LedgerSettings {
                difficulty: 1,
                batch_size: 10,
                max_mining_attempts: 1_000_000,
            },
            Box::new(SqliteBlockStore::in_memory().unwrap()),
            Box::new(signer),
        )
        .unwrap();
        Arc::new(ledger)
    }

    fn committed(session: &ProctorSession) -> Vec<CheatingEvent> {
        session.flush_pending().unwrap();
        // Queries are newest first; reverse into logging order.
        let mut events = session.events().unwrap();
        events.reverse();
        events
    }

    #[test]
    fn severity_follows_confidence() {
        let session = ProctorSession::new(ledger());
        assert!(session.log_head_misalignment("left", 0.95, Evidence::none()));
        assert!(session.log_eye_misalignment("down", 0.72, Evidence::none()));
        assert!(session.log_mobile_detection(0.55, Evidence::none()));
        assert!(session.log_head_misalignment("right", 0.2, Evidence::none()));

        let severities: Vec<_> = committed(&session).iter().map(|e| e.severity).collect();
        assert_eq!(
            severities,
            [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
        );
    }

    #[test]
    fn detections_carry_session_and_evidence() {
        let session = ProctorSession::with_session_id(ledger(), "exam-7").for_user("student-3");
        let evidence = Evidence::screenshot("shots/frame-001.jpg").with_metadata("yaw", 31.5);
        assert!(session.log_head_misalignment("left", 0.8, evidence));

        let events = committed(&session);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_type, "head_misalignment");
        assert_eq!(event.description, "Head misalignment detected: left");
        assert_eq!(event.session_id, "exam-7");
        assert_eq!(event.user_id.as_deref(), Some("student-3"));
        assert_eq!(event.screenshot_path.as_deref(), Some("shots/frame-001.jpg"));
        assert_eq!(event.metadata.get("yaw"), Some(&serde_json::json!(31.5)));
    }

    #[test]
    fn whispering_raises_lip_severity() {
        let session = ProctorSession::new(ledger());
        assert!(session.log_lip_movement("open", true, 0.3, Evidence::none()));
        assert!(session.log_lip_movement("moving", false, 0.99, Evidence::none()));

        let events = committed(&session);
        assert_eq!(events[0].severity, Severity::High);
        assert_eq!(events[0].description, "Lip movement detected: open (Whispering)");
        assert_eq!(events[1].severity, Severity::Medium);
        assert_eq!(events[1].description, "Lip movement detected: moving");
    }

    #[test]
    fn concerning_emotions_are_listed() {
        let session = ProctorSession::new(ledger());
        let flags = EmotionFlags {
            stress: true,
            fear: false,
            overconfidence: true,
        };
        assert!(session.log_emotion_detection("angry", flags, 0.6, Evidence::none()));
        assert!(session.log_emotion_detection(
            "neutral",
            EmotionFlags::default(),
            0.95,
            Evidence::none()
        ));

        let events = committed(&session);
        assert_eq!(events[0].severity, Severity::High);
        assert_eq!(
            events[0].description,
            "Concerning emotions detected: stress, overconfidence"
        );
        assert_eq!(events[1].severity, Severity::Low);
        assert_eq!(events[1].description, "Emotion detected: neutral");
    }

    #[test]
    fn statistics_cover_only_this_session() {
        let ledger = ledger();
        let mine = ProctorSession::new(Arc::clone(&ledger));
        let other = ProctorSession::new(Arc::clone(&ledger));

        assert!(mine.log_mobile_detection(0.9, Evidence::none()));
        assert!(mine.log_mobile_detection(0.4, Evidence::none()));
        assert!(mine.log_custom_event(
            "tab_switch",
            "Browser lost focus",
            Severity::Medium,
            1.0,
            Evidence::none()
        ));
        assert!(other.log_mobile_detection(0.9, Evidence::none()));

        let empty = mine.session_statistics().unwrap();
        assert_eq!(empty.total_session_events, 0);
        assert_eq!(empty.session_start_time, None);

        let events = committed(&mine);
        let stats = mine.session_statistics().unwrap();
        assert_eq!(stats.session_id, mine.session_id());
        assert_eq!(stats.total_session_events, 3);
        assert_eq!(stats.events_by_type.get("mobile_detection"), Some(&2));
        assert_eq!(stats.events_by_type.get("tab_switch"), Some(&1));
        assert_eq!(stats.events_by_severity.get("critical"), Some(&1));
        assert_eq!(stats.events_by_severity.get("low"), Some(&1));
        assert_eq!(stats.session_start_time, Some(events[0].timestamp));
        assert_eq!(stats.session_end_time, Some(events[2].timestamp));
        assert!(mine.verify_chain_integrity());
    }

    #[test]
    fn session_export_lists_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = ProctorSession::with_session_id(ledger(), "exam-9");
        assert!(session.log_eye_misalignment("up", 0.7, Evidence::none()));
        assert!(session.log_head_misalignment("down", 0.7, Evidence::none()));
        session.flush_pending().unwrap();

        let written = session.export_session_logs(&path).unwrap();
        assert_eq!(written.total_events, 2);

        let read: SessionExport = read_document(&path).unwrap();
        assert_eq!(read, written);
        assert_eq!(read.session_id, "exam-9");

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("session_id").count(), 1);
        assert!(!text.contains("user_id"));
        assert!(text.contains("\"event_type\": \"eye_misalignment\""));
    }

    #[test]
    fn emotion_flag_names_are_ordered() {
        let flags = EmotionFlags {
            stress: false,
            fear: true,
            overconfidence: true,
        };
        assert_eq!(flags.concerns(), ["fear", "overconfidence"]);
        assert!(EmotionFlags::default().concerns().is_empty());
    }
}
