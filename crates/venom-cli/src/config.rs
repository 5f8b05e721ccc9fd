use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use venom_chronos::ChronosConfig;
use venom_energy::EnergyConfig;

/// Top-level configuration for the `venom` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenomConfig {
    /// Git working tree captured by checkpoints.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,

    /// Timelines directory, relative paths resolve against the state dir.
    #[serde(default = "default_timelines_dir")]
    pub timelines_dir: String,

    /// Memory directory dumped into each checkpoint, relative to the state dir.
    #[serde(default = "default_memory_root")]
    pub memory_root: String,

    /// Environment variables recorded with each checkpoint.
    #[serde(default = "default_env_keys")]
    pub env_keys: Vec<String>,

    /// CPU usage fraction (0.0-1.0) above which the system counts as busy.
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,

    /// Memory usage fraction (0.0-1.0) above which the system counts as busy.
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold: f64,

    /// Seconds between background busy checks.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Minutes without activity before dreaming is allowed.
    #[serde(default = "default_idle_threshold_minutes")]
    pub idle_threshold_minutes: f64,
}

fn default_workspace_root() -> String {
    ".".to_string()
}

fn default_timelines_dir() -> String {
    "timelines".to_string()
}

fn default_memory_root() -> String {
    "memory".to_string()
}

fn default_env_keys() -> Vec<String> {
    ChronosConfig::default().env_keys
}

fn default_cpu_threshold() -> f64 {
    0.8
}

fn default_memory_threshold() -> f64 {
    0.85
}

fn default_check_interval_secs() -> u64 {
    5
}

fn default_idle_threshold_minutes() -> f64 {
    10.0
}

impl Default for VenomConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            timelines_dir: default_timelines_dir(),
            memory_root: default_memory_root(),
            env_keys: default_env_keys(),
            cpu_threshold: default_cpu_threshold(),
            memory_threshold: default_memory_threshold(),
            check_interval_secs: default_check_interval_secs(),
            idle_threshold_minutes: default_idle_threshold_minutes(),
        }
    }
}

impl VenomConfig {
    /// Default state directory: `$VENOM_STATE_DIR` or `~/.venom/`.
    pub fn default_state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("VENOM_STATE_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".venom")
        }
    }

    /// Config file path within the state directory.
    pub fn config_path(state_dir: &Path) -> PathBuf {
        state_dir.join("config.toml")
    }

    /// Load config from disk. Returns default if not found.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::config_path(state_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let path = Self::config_path(state_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn chronos_config(&self, state_dir: &Path) -> ChronosConfig {
        ChronosConfig::new(
            resolve(state_dir, &self.timelines_dir),
            &self.workspace_root,
            resolve(state_dir, &self.memory_root),
        )
        .with_env_keys(self.env_keys.clone())
    }

    pub fn energy_config(&self) -> EnergyConfig {
        let mut config = EnergyConfig::default()
            .with_thresholds(self.cpu_threshold, self.memory_threshold)
            .with_check_interval(Duration::from_secs(self.check_interval_secs));
        config.idle_threshold_minutes = self.idle_threshold_minutes;
        config
    }
}

fn resolve(state_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        state_dir.join(p)
    }
}
