use anyhow::Result;
use std::path::Path;

use crate::cli::ConfigAction;
use crate::config::VenomConfig;

/// Handle config subcommands.
pub fn handle(action: ConfigAction, state_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = VenomConfig::config_path(state_dir);
            if path.exists() {
                println!("Config already exists at: {}", path.display());
                println!("Use `venom config show` to view it.");
                return Ok(());
            }

            let config = VenomConfig::default();
            config.save(state_dir)?;
            println!("Created default config at: {}", path.display());
            println!();
            print_config(&config, state_dir);
        }

        ConfigAction::Show => {
            let config = VenomConfig::load(state_dir)?;
            print_config(&config, state_dir);
        }
    }
    Ok(())
}

fn print_config(config: &VenomConfig, state_dir: &Path) {
    let chronos = config.chronos_config(state_dir);
    println!("Configuration:");
    println!("  state_dir:              {}", state_dir.display());
    println!("  workspace_root:         {}", chronos.workspace_root.display());
    println!("  timelines_dir:          {}", chronos.timelines_dir.display());
    println!("  memory_root:            {}", chronos.memory_root.display());
    println!("  env_keys:               {}", config.env_keys.join(", "));
    println!("  cpu_threshold:          {:.2}", config.cpu_threshold);
    println!("  memory_threshold:       {:.2}", config.memory_threshold);
    println!("  check_interval_secs:    {}", config.check_interval_secs);
    println!("  idle_threshold_minutes: {}", config.idle_threshold_minutes);
}
