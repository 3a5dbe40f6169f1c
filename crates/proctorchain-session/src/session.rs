//! One proctored exam sitting.
//!
//! A `ProctorSession` stamps every detection with its session id (and the
//! candidate's user id, when known), picks a severity, and hands the event
//! to the shared ledger.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use proctorchain_contracts::{
    block::BlockReceipt,
    error::LedgerResult,
    event::{unix_now, CheatingEvent, Severity},
    export::{SessionEventRecord, SessionExport},
    stats::{CleanupReport, SessionStatistics},
};
use proctorchain_ledger::{export::write_document, Ledger};

/// Screenshot and detector data attached to a detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    pub screenshot_path: Option<String>,
    pub metadata: Map<String, Value>,
}

impl Evidence {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn screenshot(path: impl Into<String>) -> Self {
        Self {
            screenshot_path: Some(path.into()),
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Emotional states the emotion detector reports as concerning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmotionFlags {
    pub stress: bool,
    pub fear: bool,
    pub overconfidence: bool,
}

impl EmotionFlags {
    /// Names of the raised flags, in a fixed order.
    pub fn concerns(&self) -> Vec<&'static str> {
        [
            (self.stress, "stress"),
            (self.fear, "fear"),
            (self.overconfidence, "overconfidence"),
        ]
        .into_iter()
        .filter_map(|(raised, name)| raised.then_some(name))
        .collect()
    }
}

/// Detector-facing handle for one exam session.
#[derive(Debug, Clone)]
pub struct ProctorSession {
    ledger: Arc<Ledger>,
    session_id: String,
    user_id: Option<String>,
}

impl ProctorSession {
    /// Start a session with a fresh UUID v4 id.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self::with_session_id(ledger, uuid::Uuid::new_v4().to_string())
    }

    /// Attach to an existing session id, e.g. after a restart.
    pub fn with_session_id(ledger: Arc<Ledger>, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        info!(session_id = %session_id, "proctoring session attached");
        Self {
            ledger,
            session_id,
            user_id: None,
        }
    }

    #[must_use]
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    // ── Detections ───────────────────────────────────────────────────────────

    pub fn log_head_misalignment(
        &self,
        direction: &str,
        confidence: f64,
        evidence: Evidence,
    ) -> bool {
        self.log(
            "head_misalignment",
            Severity::from_confidence(confidence),
            format!("Head misalignment detected: {}", direction),
            confidence,
            evidence,
        )
    }

    pub fn log_eye_misalignment(&self, direction: &str, confidence: f64, evidence: Evidence) -> bool {
        self.log(
            "eye_misalignment",
            Severity::from_confidence(confidence),
            format!("Eye misalignment detected: {}", direction),
            confidence,
            evidence,
        )
    }

    pub fn log_mobile_detection(&self, confidence: f64, evidence: Evidence) -> bool {
        self.log(
            "mobile_detection",
            Severity::from_confidence(confidence),
            "Mobile device detected during exam".to_string(),
            confidence,
            evidence,
        )
    }

    /// Whispering is always high severity; other lip movement is medium.
    pub fn log_lip_movement(
        &self,
        lip_state: &str,
        is_whispering: bool,
        confidence: f64,
        evidence: Evidence,
    ) -> bool {
        let (severity, description) = if is_whispering {
            (
                Severity::High,
                format!("Lip movement detected: {} (Whispering)", lip_state),
            )
        } else {
            (Severity::Medium, format!("Lip movement detected: {}", lip_state))
        };
        self.log("lip_movement", severity, description, confidence, evidence)
    }

    /// High severity when any concerning flag is raised, low otherwise.
    pub fn log_emotion_detection(
        &self,
        emotion: &str,
        flags: EmotionFlags,
        confidence: f64,
        evidence: Evidence,
    ) -> bool {
        let concerns = flags.concerns();
        let (severity, description) = if concerns.is_empty() {
            (Severity::Low, format!("Emotion detected: {}", emotion))
        } else {
            (
                Severity::High,
                format!("Concerning emotions detected: {}", concerns.join(", ")),
            )
        };
        self.log("emotion_detection", severity, description, confidence, evidence)
    }

    pub fn log_custom_event(
        &self,
        event_type: &str,
        description: &str,
        severity: Severity,
        confidence: f64,
        evidence: Evidence,
    ) -> bool {
        self.log(
            event_type,
            severity,
            description.to_string(),
            confidence,
            evidence,
        )
    }

    fn log(
        &self,
        event_type: &str,
        severity: Severity,
        description: String,
        confidence: f64,
        evidence: Evidence,
    ) -> bool {
        let mut event = CheatingEvent::new(event_type, severity, description, confidence)
            .with_session_id(self.session_id.clone())
            .with_metadata(evidence.metadata);
        if let Some(path) = evidence.screenshot_path {
            event = event.with_screenshot(path);
        }
        if let Some(user_id) = &self.user_id {
            event = event.with_user_id(user_id.clone());
        }
        self.ledger.log_event(event)
    }

    // ── Reporting ────────────────────────────────────────────────────────────

    /// Committed events of this session, newest first.
    pub fn events(&self) -> LedgerResult<Vec<CheatingEvent>> {
        self.ledger.get_events_by_session(&self.session_id, usize::MAX)
    }

    /// Counts and time span over this session's committed events.
    pub fn session_statistics(&self) -> LedgerResult<SessionStatistics> {
        let events = self.events()?;

        let mut events_by_type = BTreeMap::new();
        let mut events_by_severity = BTreeMap::new();
        for event in &events {
            *events_by_type.entry(event.event_type.clone()).or_insert(0) += 1;
            *events_by_severity
                .entry(event.severity.as_str().to_string())
                .or_insert(0) += 1;
        }

        let timestamps = events.iter().map(|e| e.timestamp);
        Ok(SessionStatistics {
            session_id: self.session_id.clone(),
            total_session_events: events.len() as u64,
            events_by_type,
            events_by_severity,
            session_start_time: timestamps.clone().reduce(f64::min),
            session_end_time: timestamps.reduce(f64::max),
        })
    }

    /// Write this session's committed events to `path` as pretty JSON.
    pub fn export_session_logs(&self, path: &Path) -> LedgerResult<SessionExport> {
        let events: Vec<SessionEventRecord> =
            self.events()?.into_iter().map(SessionEventRecord::from).collect();
        let export = SessionExport {
            session_id: self.session_id.clone(),
            export_timestamp: unix_now(),
            total_events: events.len() as u64,
            events,
        };

        write_document(path, &export)?;
        info!(
            session_id = %self.session_id,
            path = %path.display(),
            events = export.total_events,
            "session logs exported"
        );
        Ok(export)
    }

    pub fn flush_pending(&self) -> LedgerResult<Option<BlockReceipt>> {
        self.ledger.flush_pending()
    }

    pub fn verify_chain_integrity(&self) -> bool {
        self.ledger.verify_chain()
    }

    pub fn cleanup_old_data(&self, max_age_days: u32) -> LedgerResult<CleanupReport> {
        self.ledger.cleanup_old_screenshots(max_age_days)
    }
}
