//! Demo command - manage demo mode

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use pesa_core::adapters::memory::{DEMO_EMAIL, DEMO_PASSWORD, DEMO_STATE_FILE};
use pesa_core::config::Config;

use super::get_pesa_dir;

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Enable demo mode (starts from fresh demo data)
    #[command(name = "on")]
    On,
    /// Disable demo mode
    #[command(name = "off")]
    Off,
    /// Show demo mode status
    Status,
}

pub fn run(command: Option<DemoCommands>) -> Result<()> {
    let pesa_dir = get_pesa_dir()?;
    std::fs::create_dir_all(&pesa_dir)?;
    let mut config = Config::load(&pesa_dir)?;

    match command {
        Some(DemoCommands::On) => {
            reset_demo_data(&pesa_dir)?;
            config.enable_demo_mode();
            config.save(&pesa_dir)?;
            println!("{}", "Demo mode enabled".green());
            println!(
                "Sign in with 'pesa login --email {}' (password: {}).",
                DEMO_EMAIL, DEMO_PASSWORD
            );
            Ok(())
        }
        Some(DemoCommands::Off) => {
            config.disable_demo_mode();
            config.save(&pesa_dir)?;
            println!("{}", "Demo mode disabled".yellow());
            Ok(())
        }
        Some(DemoCommands::Status) | None => {
            if config.demo_mode {
                println!("Demo mode is {}", "ON".green());
            } else {
                println!("Demo mode is {}", "OFF".yellow());
            }
            Ok(())
        }
    }
}

/// Delete the demo backend snapshot and demo cache so the next run reseeds
fn reset_demo_data(pesa_dir: &Path) -> Result<()> {
    let state_file = pesa_dir.join(DEMO_STATE_FILE);
    if state_file.exists() {
        std::fs::remove_file(&state_file)
            .with_context(|| format!("Failed to remove {:?}", state_file))?;
    }
    let cache_dir = pesa_dir.join("demo-cache");
    if cache_dir.exists() {
        std::fs::remove_dir_all(&cache_dir)
            .with_context(|| format!("Failed to remove {:?}", cache_dir))?;
    }
    Ok(())
}
