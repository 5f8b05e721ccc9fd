use anyhow::Result;
use std::path::Path;

use venom_energy::{EnergyManager, EnergyStatus};

use crate::cli::EnergyAction;
use crate::config::VenomConfig;

/// Handle energy subcommands.
pub async fn handle(action: EnergyAction, state_dir: &Path) -> Result<()> {
    let config = VenomConfig::load(state_dir)?;
    let manager = EnergyManager::new(config.energy_config());

    match action {
        EnergyAction::Status { json } => {
            let status = manager.get_status().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        EnergyAction::Busy => {
            if manager.is_system_busy().await {
                println!("busy");
                std::process::exit(1);
            }
            println!("available");
        }
    }
    Ok(())
}

fn print_status(status: &EnergyStatus) {
    println!("Energy:");
    match &status.metrics {
        Some(m) => {
            println!(
                "  cpu:          {:.1}% (threshold {:.0}%)",
                m.cpu_percent, status.cpu_threshold_percent
            );
            println!(
                "  memory:       {:.1}% (threshold {:.0}%)",
                m.memory_percent, status.memory_threshold_percent
            );
            match m.temperature {
                Some(t) => println!("  temperature:  {t:.1} C"),
                None => println!("  temperature:  (unavailable)"),
            }
        }
        None => println!("  metrics:      (unavailable)"),
    }
    println!("  busy:         {}", status.is_busy);
    println!("  idle:         {} ({:.0}s)", status.is_idle, status.idle_seconds);
}
