//! Homecast CLI - Command-line interface
//!
//! Drives the playback dispatcher against the built-in title catalog.

mod commands;
mod titles;

use std::path::PathBuf;

use clap::Parser;
use homecast_core::HomecastConfig;
use homecast_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "homecast")]
#[command(about = "Play titles by name on streaming services or from local media")]
struct Cli {
    /// Console log level
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Warn)]
    log_level: CliLogLevel,

    /// JSON configuration file (defaults plus environment overrides when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), None)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let config = match &cli.config {
        Some(path) => HomecastConfig::from_json_file(path)?,
        None => HomecastConfig::from_env(),
    };
    tracing::debug!(?config, "Configuration loaded");

    commands::handle_command(cli.command, &config).await
}
