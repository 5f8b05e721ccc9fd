use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the timeline that always exists.
pub const MAIN_TIMELINE: &str = "main";

/// Length of a checkpoint id in hex characters.
pub const CHECKPOINT_ID_LEN: usize = 8;

/// Metadata describing one snapshot on a timeline.
///
/// The timestamp is kept as the raw RFC 3339 string written at creation so
/// that listings can still surface checkpoints whose timestamp no longer
/// parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub name: String,
    pub timestamp: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Checkpoint {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            checkpoint_id: short_id(),
            name: name.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            description: description.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Parsed creation time, if the stored timestamp is valid RFC 3339.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Timeline recorded in the metadata at creation time.
    pub fn timeline(&self) -> Option<&str> {
        self.metadata.get("timeline").and_then(|v| v.as_str())
    }
}

/// Snapshot of selected process configuration at checkpoint time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSnapshot {
    pub timestamp: String,
    pub settings: BTreeMap<String, Option<String>>,
}

impl EnvSnapshot {
    /// Capture the current values of `keys` from the process environment.
    pub fn capture<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let settings = keys
            .into_iter()
            .map(|k| {
                let key = k.as_ref().to_string();
                let value = std::env::var(&key).ok();
                (key, value)
            })
            .collect();
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            settings,
        }
    }
}

/// Generate an 8-character lowercase hex token.
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..CHECKPOINT_ID_LEN].to_string()
}
