use anyhow::{Context, Result};
use std::path::Path;

use venom_types::Checkpoint;

use super::open_chronos;
use crate::cli::CheckpointAction;

/// Handle checkpoint subcommands.
pub async fn handle(action: CheckpointAction, state_dir: &Path) -> Result<()> {
    let chronos = open_chronos(state_dir)?;

    match action {
        CheckpointAction::Create {
            name,
            description,
            timeline,
        } => {
            let receipt = chronos
                .create_checkpoint_with_receipt(&name, &description, &timeline)
                .await
                .with_context(|| format!("Failed to create checkpoint '{name}'"))?;
            println!(
                "Created checkpoint {} on timeline {}",
                receipt.checkpoint.checkpoint_id, timeline
            );
            if let Some(reason) = receipt.memory_backup.reason() {
                println!("  warning: memory not captured: {reason}");
            }
        }

        CheckpointAction::List { timeline, json } => {
            let checkpoints = chronos.list_checkpoints(&timeline)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&checkpoints)?);
            } else if checkpoints.is_empty() {
                println!("No checkpoints on timeline {timeline}");
            } else {
                println!("Checkpoints on {} ({}):", timeline, checkpoints.len());
                for cp in &checkpoints {
                    print_row(cp);
                }
            }
        }

        CheckpointAction::Restore { id, timeline } => {
            let restored = chronos
                .restore_checkpoint(&id, &timeline)
                .await
                .with_context(|| format!("Failed to restore checkpoint {id}"))?;
            if restored {
                println!("Restored checkpoint {id} from timeline {timeline}");
            } else {
                println!("Checkpoint {id} not found on timeline {timeline}");
            }
        }

        CheckpointAction::Delete { id, timeline } => {
            if chronos.delete_checkpoint(&id, &timeline)? {
                println!("Deleted checkpoint {id}");
            } else {
                println!("Checkpoint {id} not found on timeline {timeline}");
            }
        }
    }
    Ok(())
}

fn print_row(cp: &Checkpoint) {
    let when = cp
        .created_at()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| cp.timestamp.clone());
    if cp.description.is_empty() {
        println!("  {}  {}  {}", cp.checkpoint_id, when, cp.name);
    } else {
        println!("  {}  {}  {} - {}", cp.checkpoint_id, when, cp.name, cp.description);
    }
}
