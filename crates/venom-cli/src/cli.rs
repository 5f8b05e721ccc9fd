use std::path::PathBuf;

use clap::{Parser, Subcommand};

use venom_types::MAIN_TIMELINE;

#[derive(Parser)]
#[command(name = "venom", about = "Workspace checkpoints, timelines and resource monitoring")]
pub struct Cli {
    /// State directory (defaults to $VENOM_STATE_DIR or ~/.venom)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Checkpoint management
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointAction,
    },
    /// Timeline management
    Timeline {
        #[command(subcommand)]
        action: TimelineAction,
    },
    /// System load and idle state
    Energy {
        #[command(subcommand)]
        action: EnergyAction,
    },
    /// Configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum CheckpointAction {
    /// Capture the workspace, memory and environment
    Create {
        /// Checkpoint name
        #[arg(long)]
        name: String,
        /// Free-form description
        #[arg(long, default_value = "")]
        description: String,
        /// Timeline to record on
        #[arg(long, default_value = MAIN_TIMELINE)]
        timeline: String,
    },
    /// List checkpoints, newest first
    List {
        #[arg(long, default_value = MAIN_TIMELINE)]
        timeline: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Restore a checkpoint (discards uncommitted tracked changes)
    Restore {
        /// Checkpoint id
        id: String,
        #[arg(long, default_value = MAIN_TIMELINE)]
        timeline: String,
    },
    /// Delete a checkpoint
    Delete {
        /// Checkpoint id
        id: String,
        #[arg(long, default_value = MAIN_TIMELINE)]
        timeline: String,
    },
}

#[derive(Subcommand)]
pub enum TimelineAction {
    /// List timelines
    List,
    /// Create an empty timeline
    Create { name: String },
    /// Delete a timeline and all its checkpoints
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum EnergyAction {
    /// Show metrics, thresholds and idle state
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Exit with status 1 when the system is busy
    Busy,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default config file
    Init,
    /// Show the effective configuration
    Show,
}
