use serde::{Deserialize, Serialize};

/// Outcome of a best-effort side effect.
///
/// Operations that are allowed to degrade report what happened through this
/// type instead of only logging it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum SideEffect {
    #[default]
    Ok,
    Degraded(String),
    Fatal(String),
}

impl SideEffect {
    pub fn degraded(reason: impl Into<String>) -> Self {
        SideEffect::Degraded(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        SideEffect::Fatal(reason.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, SideEffect::Ok)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, SideEffect::Degraded(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SideEffect::Ok => None,
            SideEffect::Degraded(r) | SideEffect::Fatal(r) => Some(r),
        }
    }
}
