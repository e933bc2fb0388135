//! Azio Levetron Mech5 keypad driver CLI
//!
//! Runs the driver daemon and provides small helper commands around it.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use mech5_driver::DriverConfig;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load config
    let config_path = cli.config.unwrap_or_else(DriverConfig::default_path);
    info!("Loading config from {:?}", config_path);
    let config = DriverConfig::load(&config_path)?;

    match cli.command {
        None | Some(Commands::Daemon) => mech5_driver::daemon::run(config).await,
        Some(Commands::Led { value, device }) => {
            commands::led::run(&config, device, value.as_deref()).await
        }
        Some(Commands::List) => commands::list::run(),
        Some(Commands::Descriptor { file, live, output }) => {
            commands::descriptor::run(file.as_deref(), live, output.as_deref())
        }
    }
}
