//! portgate — per-address ufw access management for the RPC and Geyser ports
//!
//! Reads the target ports from configuration (`RPC_PORT` / `GEYSER_PORT`),
//! then lists, grants, revokes or checks access through `ufw`. Every
//! firewall command runs through the privilege helper (`sudo -n` by default).

use anyhow::{Context, Result};
use clap::Parser;
use portgate_access::{AccessControl, AccessError};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod endpoints;

use commands::CommandLine;

/// Exit code for rejected caller input
const EXIT_INVALID_INPUT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CommandLine::parse();

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("portgate: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.system.log_level, cli.verbose) {
        eprintln!("portgate: {e:#}");
    }

    match &config.source {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => warn!("No configuration file found, using defaults and environment"),
    }

    let targets = config.target_ports();
    if targets.is_configured() {
        info!(
            "Target ports: {}",
            targets
                .iter()
                .map(|t| format!("{}={}", t.role, t.port))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let control = AccessControl::new(Arc::new(config.runner()), config.ufw(), targets);

    match commands::dispatch(&cli.command, &control, &config, cli.json).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            match e.downcast_ref::<AccessError>() {
                Some(access) if access.is_caller_error() => ExitCode::from(EXIT_INVALID_INPUT),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn init_logging(level: &str, verbose: u8) -> Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so `--json` output stays machine-readable
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}
