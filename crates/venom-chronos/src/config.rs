use std::path::PathBuf;

/// Configuration for the checkpoint engine.
#[derive(Debug, Clone)]
pub struct ChronosConfig {
    /// Root directory holding one subdirectory per timeline.
    pub timelines_dir: PathBuf,
    /// Directory inside a git working tree whose state is captured.
    pub workspace_root: PathBuf,
    /// Directory dumped wholesale into every checkpoint.
    pub memory_root: PathBuf,
    /// Environment variables recorded in the environment snapshot.
    pub env_keys: Vec<String>,
    /// Git executable.
    pub git_binary: String,
}

impl ChronosConfig {
    pub fn new(
        timelines_dir: impl Into<PathBuf>,
        workspace_root: impl Into<PathBuf>,
        memory_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            timelines_dir: timelines_dir.into(),
            workspace_root: workspace_root.into(),
            memory_root: memory_root.into(),
            env_keys: default_env_keys(),
            git_binary: "git".to_string(),
        }
    }

    pub fn with_env_keys(mut self, keys: Vec<String>) -> Self {
        self.env_keys = keys;
        self
    }

    pub fn with_git_binary(mut self, binary: impl Into<String>) -> Self {
        self.git_binary = binary.into();
        self
    }
}

impl Default for ChronosConfig {
    fn default() -> Self {
        Self::new(".venom/timelines", ".", ".venom/memory")
    }
}

fn default_env_keys() -> Vec<String> {
    ["VENOM_MODEL", "VENOM_LOG", "RUST_LOG"]
        .into_iter()
        .map(String::from)
        .collect()
}
