use thiserror::Error;

use crate::dream::{DreamEvent, DreamState};

#[derive(Debug, Error)]
pub enum VenomError {
    #[error("State transition error: cannot transition from {from:?} via {event:?}")]
    InvalidStateTransition { from: DreamState, event: DreamEvent },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git command `{command}` failed: {message}")]
    Git { command: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid timeline name: '{0}'")]
    InvalidTimelineName(String),

    #[error("Timeline '{0}' is protected and cannot be deleted")]
    ProtectedTimeline(String),

    #[error("Checkpoint integrity check failed: {0}")]
    Integrity(String),

    #[error("Restore failed, manual inspection required: {0}")]
    RestoreFailed(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Knowledge source error: {0}")]
    Knowledge(String),

    #[error("Lessons store error: {0}")]
    Lessons(String),

    #[error("Sensor error: {0}")]
    Sensor(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for VenomError {
    fn from(e: serde_json::Error) -> Self {
        VenomError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VenomError>;
