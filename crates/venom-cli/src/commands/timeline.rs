use anyhow::Result;
use std::path::Path;

use super::open_chronos;
use crate::cli::TimelineAction;

/// Handle timeline subcommands.
pub fn handle(action: TimelineAction, state_dir: &Path) -> Result<()> {
    let chronos = open_chronos(state_dir)?;

    match action {
        TimelineAction::List => {
            for name in chronos.list_timelines()? {
                let count = chronos.list_checkpoints(&name)?.len();
                println!("  {name} ({count} checkpoints)");
            }
        }
        TimelineAction::Create { name } => {
            if chronos.create_timeline(&name)? {
                println!("Created timeline {name}");
            } else {
                println!("Timeline {name} already exists");
            }
        }
        TimelineAction::Delete { name } => {
            if chronos.delete_timeline(&name)? {
                println!("Deleted timeline {name}");
            } else {
                println!("Timeline {name} not found");
            }
        }
    }
    Ok(())
}
