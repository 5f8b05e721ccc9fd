pub mod checkpoint;
pub mod config;
pub mod energy;
pub mod timeline;

use anyhow::{Context, Result};
use std::path::Path;

use venom_chronos::ChronosEngine;

use crate::config::VenomConfig;

/// Build a checkpoint engine from the config in `state_dir`.
pub(crate) fn open_chronos(state_dir: &Path) -> Result<ChronosEngine> {
    let config = VenomConfig::load(state_dir)?;
    ChronosEngine::new(config.chronos_config(state_dir))
        .context("Failed to initialise checkpoint store")
}
