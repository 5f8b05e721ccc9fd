use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VenomError;

/// Difficulty hint for generated scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = VenomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(VenomError::Internal(format!("unknown difficulty '{other}'"))),
        }
    }
}

/// A structured coding task used as dream material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub task_prompt: String,
    #[serde(default)]
    pub test_cases: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub libraries: Vec<String>,
}

impl Scenario {
    pub fn new(title: impl Into<String>, task_prompt: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            task_prompt: task_prompt.into(),
            test_cases: Vec::new(),
            difficulty: Difficulty::default(),
            libraries: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_test_cases(mut self, cases: Vec<String>) -> Self {
        self.test_cases = cases;
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_libraries(mut self, libraries: Vec<String>) -> Self {
        self.libraries = libraries;
        self
    }
}
