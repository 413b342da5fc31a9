use anyhow::{Context, Result};
use clap::Parser;
use probe_config::{ConfigLoader, LogLevel, ProbeConfig};
use probe_logging::init_logging_from_config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{listen_command, predict_command, print_config_command, routing_command, search_command};

fn load_config(config_path: Option<&PathBuf>, log_level: Option<&String>) -> Result<ProbeConfig> {
    let loader = ConfigLoader::new();
    let mut config = loader.load(config_path).with_context(|| match config_path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from environment".to_string(),
    })?;

    if let Some(level) = log_level {
        config.logging.level = level
            .parse::<LogLevel>()
            .map_err(anyhow::Error::msg)
            .context("Invalid --log-level")?;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref(), cli.log_level.as_ref())?;
    init_logging_from_config(&config.logging)?;
    debug!("Effective configuration loaded");
    info!("ewma-probe starting");

    match cli.command {
        Commands::Routing {
            requests,
            threshold,
        } => routing_command(config, requests, threshold).await,
        Commands::Predict {
            fast_latency_ms,
            slow_latency_ms,
        } => {
            predict_command(&config.routing, fast_latency_ms, slow_latency_ms);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Listen {
            port,
            key,
            timeout_secs,
        } => {
            listen_command(config.callback, port, &key, timeout_secs).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Search {
            criteria_json,
            timeout_secs,
        } => {
            search_command(config, &criteria_json, timeout_secs).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::PrintConfig => {
            print_config_command(&config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
