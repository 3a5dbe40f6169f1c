//! The unit of observation: one detected proctoring condition.
//!
//! A `CheatingEvent` is built once by a producer (a detector or the session
//! layer), handed to the ledger, and never modified afterwards.  Its serialized
//! field names are part of the hash contract, so they must not be renamed.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LedgerError;

/// How serious a detected condition is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, least to most serious.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Map a detector confidence score to a severity.
    ///
    /// `>= 0.9` critical, `>= 0.7` high, `>= 0.5` medium, otherwise low.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Severity::Critical
        } else if confidence >= 0.7 {
            Severity::High
        } else if confidence >= 0.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(LedgerError::Serialization {
                reason: format!("unknown severity '{}'", other),
            }),
        }
    }
}

/// One detected proctoring condition.
///
/// Build with [`CheatingEvent::new`] and the `with_*` methods; identifiers
/// and the capture timestamp are filled in automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheatingEvent {
    /// Globally unique identifier (UUID v4 unless supplied).
    pub event_id: String,

    /// Capture time in seconds since the Unix epoch.
    pub timestamp: f64,

    /// Category tag, e.g. `"head_misalignment"` or `"mobile_detection"`.
    pub event_type: String,

    pub severity: Severity,

    /// Free-text description for reviewers.
    pub description: String,

    /// Detector confidence, nominally in `[0, 1]`.  Not range-checked:
    /// producers are trusted.
    pub confidence_score: f64,

    /// Path of the frame captured when the condition was detected.
    pub screenshot_path: Option<String>,

    /// Detector-specific key/value data.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Exam session the event belongs to (UUID v4 unless supplied).
    pub session_id: String,

    pub user_id: Option<String>,
}

impl CheatingEvent {
    /// Create an event stamped with the current time and fresh identifiers.
    pub fn new(
        event_type: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        confidence_score: f64,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: unix_now(),
            event_type: event_type.into(),
            severity,
            description: description.into(),
            confidence_score,
            screenshot_path: None,
            metadata: Map::new(),
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
        }
    }

    #[must_use]
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }

    /// Attach detector metadata, replacing any previous map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
///
/// Microsecond precision, matching the resolution stored in the ledger.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
