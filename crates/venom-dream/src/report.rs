use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use venom_types::{DreamState, SideEffect};

/// How a session that actually ran came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Completed,
    Interrupted,
}

/// Safety checkpoint worth restoring after a poor session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreHint {
    pub checkpoint_id: String,
    pub timeline: String,
}

/// One scenario's generate, validate and persist cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DreamAttempt {
    pub success: bool,
    pub scenario: String,
    pub attempt_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<Uuid>,
    pub artifact: SideEffect,
}

impl DreamAttempt {
    pub fn failed(
        scenario: impl Into<String>,
        attempt_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            scenario: scenario.into(),
            attempt_id: attempt_id.into(),
            code: None,
            reason: Some(reason.into()),
            lesson_id: None,
            artifact: SideEffect::Ok,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub status: SessionStatus,
    pub duration_seconds: f64,
    pub dreams_attempted: usize,
    pub dreams_successful: usize,
    pub scenarios: Vec<String>,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_hint: Option<RestoreHint>,
    pub attempts: Vec<DreamAttempt>,
    /// Whether the safety checkpoint could be taken.
    pub safety: SideEffect,
}

/// Result of one `enter_rem_phase` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemReport {
    /// Another session holds the engine.
    NotIdle { error: String, state: DreamState },
    NoKnowledge,
    Failed { session_id: String, error: String },
    Session(SessionReport),
}

impl RemReport {
    pub fn not_idle(state: DreamState) -> Self {
        RemReport::NotIdle {
            error: "Dream engine not idle".to_string(),
            state,
        }
    }

    pub fn session(&self) -> Option<&SessionReport> {
        match self {
            RemReport::Session(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_not_idle(&self) -> bool {
        matches!(self, RemReport::NotIdle { .. })
    }

    pub fn dreams_attempted(&self) -> usize {
        self.session().map_or(0, |s| s.dreams_attempted)
    }

    /// JSON view of the report.
    pub fn to_value(&self) -> Value {
        match self {
            RemReport::NotIdle { error, state } => json!({
                "error": error,
                "state": state,
            }),
            RemReport::NoKnowledge => json!({
                "status": "no_knowledge",
                "dreams_attempted": 0,
                "dreams_successful": 0,
            }),
            RemReport::Failed { session_id, error } => json!({
                "session_id": session_id,
                "status": "error",
                "error": error,
            }),
            RemReport::Session(s) => serde_json::to_value(s).unwrap_or_else(|e| {
                json!({"session_id": s.session_id, "status": "error", "error": e.to_string()})
            }),
        }
    }
}

/// Cumulative counters across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DreamStatistics {
    pub total_dreams: u64,
    pub successful_dreams: u64,
    pub success_rate: f64,
    pub artifact_files: usize,
    pub state: DreamState,
}

pub(crate) fn success_rate(successes: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        successes as f64 / total as f64
    }
}
