use std::path::PathBuf;
use std::time::Duration;

/// Configuration for REM sessions.
#[derive(Debug, Clone)]
pub struct DreamConfig {
    /// Scenarios attempted per session unless the caller overrides it.
    pub max_scenarios: usize,
    /// Ask the reviewer agent to judge every solution before saving it.
    pub strict_validation: bool,
    /// Where code artifacts and their JSON sidecars are written.
    pub dreams_dir: PathBuf,
    /// Language requested from the coder and used to pick fenced blocks.
    pub target_language: String,
    /// File extension of code artifacts.
    pub artifact_extension: String,
    /// Candidates considered per requested scenario before sampling.
    pub candidate_pool_factor: usize,
    /// Upper bound on each agent call. `None` waits indefinitely.
    pub agent_timeout: Option<Duration>,
    /// Success rate at or below which the report carries a restore hint.
    pub low_success_threshold: f64,
    /// Libraries suggested to the scenario weaver.
    pub default_libraries: Vec<String>,
    /// Renice the process for the duration of a session.
    pub lower_priority: bool,
}

impl Default for DreamConfig {
    fn default() -> Self {
        Self {
            max_scenarios: 3,
            strict_validation: true,
            dreams_dir: PathBuf::from(".venom/dreams"),
            target_language: "python".to_string(),
            artifact_extension: "py".to_string(),
            candidate_pool_factor: 3,
            agent_timeout: None,
            low_success_threshold: 0.5,
            default_libraries: Vec::new(),
            lower_priority: true,
        }
    }
}

impl DreamConfig {
    pub fn with_dreams_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dreams_dir = dir.into();
        self
    }

    pub fn with_max_scenarios(mut self, n: usize) -> Self {
        self.max_scenarios = n;
        self
    }

    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    pub fn with_lower_priority(mut self, lower: bool) -> Self {
        self.lower_priority = lower;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent_timeout = timeout;
        self
    }
}
