mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::config::VenomConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let state_dir = cli
        .state_dir
        .clone()
        .unwrap_or_else(VenomConfig::default_state_dir);
    tracing::debug!("Using state directory {}", state_dir.display());

    match cli.command {
        Commands::Checkpoint { action } => commands::checkpoint::handle(action, &state_dir).await,
        Commands::Timeline { action } => commands::timeline::handle(action, &state_dir),
        Commands::Energy { action } => commands::energy::handle(action, &state_dir).await,
        Commands::Config { action } => commands::config::handle(action, &state_dir),
    }
}
