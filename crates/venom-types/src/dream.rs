use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VenomError};

/// Dream engine state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DreamState {
    #[default]
    Idle,
    Dreaming,
    Validating,
    Saving,
    Interrupted,
}

/// Events that drive dream state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DreamEvent {
    StartSession,
    StartValidation,
    ValidationPassed,
    BeginSaving,
    AttemptFinished,
    Interrupt,
    EndSession,
}

impl DreamState {
    /// Attempt a state transition given an event.
    ///
    /// `Interrupted` absorbs every in-session event so an attempt that is
    /// still running cannot overwrite the interruption.
    pub fn transition(self, event: DreamEvent) -> Result<DreamState> {
        use DreamEvent::*;
        use DreamState::*;
        match (self, event) {
            (_, EndSession) => Ok(Idle),

            (Idle, StartSession) => Ok(Dreaming),
            // Wake-up while idle is a no-op.
            (Idle, Interrupt) => Ok(Idle),

            (Dreaming, StartValidation) => Ok(Validating),
            (Dreaming, BeginSaving) => Ok(Saving),
            (Validating, ValidationPassed) => Ok(Saving),
            (Dreaming | Validating | Saving, AttemptFinished) => Ok(Dreaming),
            (Dreaming | Validating | Saving, Interrupt) => Ok(Interrupted),

            (
                Interrupted,
                StartValidation | ValidationPassed | BeginSaving | AttemptFinished | Interrupt,
            ) => Ok(Interrupted),

            (state, event) => Err(VenomError::InvalidStateTransition { from: state, event }),
        }
    }

    /// Whether a session is currently in flight.
    pub fn is_active(self) -> bool {
        self != DreamState::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DreamState::Idle => "idle",
            DreamState::Dreaming => "dreaming",
            DreamState::Validating => "validating",
            DreamState::Saving => "saving",
            DreamState::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for DreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
