//! Command-line definitions and handlers
//!
//! Addresses are validated here, before they reach the access layer, which
//! trusts its callers on syntax.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use portgate_access::{AccessControl, AccessError, AddressAccess, FullAccessRule};
use serde::Serialize;
use std::fmt::Write as _;
use std::future::Future;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::PortgateConfig;
use crate::endpoints::ServiceEndpoints;

#[derive(Parser)]
#[command(name = "portgate", version)]
#[command(about = "Manage per-address ufw access to the RPC and Geyser ports")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: $PORTGATE_CONFIG or /etc/portgate/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List addresses with access to every target port
    List,
    /// Allow an address on every target port
    Grant { address: String },
    /// Remove an address from every target port
    Revoke { address: String },
    /// Allow an address on a single target port
    GrantPort { address: String, port: String },
    /// Remove an address from a single target port
    RevokePort { address: String, port: String },
    /// Show per-port access for an address
    Check { address: String },
    /// Show the public RPC and Geyser URLs
    Endpoints,
}

/// Accept dotted-quad IPv4 addresses only
pub fn validate_address(raw: &str) -> Result<String, AccessError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<Ipv4Addr>()
        .map(|addr| addr.to_string())
        .map_err(|_| AccessError::InvalidAddress {
            address: trimmed.to_string(),
        })
}

pub async fn dispatch(
    command: &Commands,
    control: &AccessControl,
    config: &PortgateConfig,
    json: bool,
) -> Result<()> {
    match command {
        Commands::List => {
            if !control.targets().is_configured() {
                warn!("RPC_PORT and GEYSER_PORT must both be set to manage access");
            }
            let rules = control.reader.list_full_access_rules().await?;
            emit(json, rules.as_slice(), render_rules)
        }
        Commands::Grant { address } => {
            let address = validate_address(address)?;
            let access =
                change_then_check(control, &address, control.mutator.grant_full_access(&address))
                    .await?;
            info!("Granted full access to {address}");
            emit(json, &access, render_access)
        }
        Commands::Revoke { address } => {
            let address = validate_address(address)?;
            let access =
                change_then_check(control, &address, control.mutator.revoke_full_access(&address))
                    .await?;
            info!("Revoked full access from {address}");
            emit(json, &access, render_access)
        }
        Commands::GrantPort { address, port } => {
            let address = validate_address(address)?;
            let change = control.mutator.grant_single_port(&address, port.trim());
            let access = change_then_check(control, &address, change).await?;
            emit(json, &access, render_access)
        }
        Commands::RevokePort { address, port } => {
            let address = validate_address(address)?;
            let change = control.mutator.revoke_single_port(&address, port.trim());
            let access = change_then_check(control, &address, change).await?;
            emit(json, &access, render_access)
        }
        Commands::Check { address } => {
            let address = validate_address(address)?;
            let access = control.reader.check_address_access(&address).await?;
            emit(json, &access, render_access)
        }
        Commands::Endpoints => {
            let endpoints = ServiceEndpoints::from_config(&config.service);
            emit(json, &endpoints, render_endpoints)
        }
    }
}

/// Apply a firewall change, then read back the address's per-port state.
///
/// Multi-port changes are not rolled back, so when ufw fails part-way the
/// current state is re-read and logged before the error is returned.
async fn change_then_check<F>(
    control: &AccessControl,
    address: &str,
    change: F,
) -> Result<AddressAccess, AccessError>
where
    F: Future<Output = Result<(), AccessError>>,
{
    if let Err(e) = change.await {
        if matches!(e, AccessError::ExternalTool { .. }) {
            match control.reader.check_address_access(address).await {
                Ok(access) => warn!(
                    "Access for {address} after failed change: {}",
                    summarize(&access)
                ),
                Err(read_err) => warn!("Could not re-read access for {address}: {read_err}"),
            }
        }
        return Err(e);
    }
    control.reader.check_address_access(address).await
}

fn summarize(access: &AddressAccess) -> String {
    access
        .ports
        .iter()
        .map(|p| format!("{}={}", p.role, if p.granted { "allowed" } else { "not allowed" }))
        .collect::<Vec<_>>()
        .join(", ")
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, render: fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", render(value));
    }
    Ok(())
}

fn render_rules(rules: &[FullAccessRule]) -> String {
    if rules.is_empty() {
        return "No addresses have full access\n".to_string();
    }

    let mut out = format!("{:<18} PORTS\n", "ADDRESS");
    for rule in rules {
        let _ = writeln!(out, "{:<18} {}", rule.address, rule.ports.join(", "));
    }
    out
}

fn render_access(access: &AddressAccess) -> String {
    let mut out = format!(
        "{} ({})\n",
        access.address,
        if access.full_access { "full access" } else { "no full access" }
    );
    for port in &access.ports {
        let _ = writeln!(
            out,
            "  {:<8} {:<6} {}",
            port.role,
            port.port,
            if port.granted { "allowed" } else { "not allowed" }
        );
    }
    out
}

fn render_endpoints(endpoints: &ServiceEndpoints) -> String {
    format!(
        "RPC:    {}\nGeyser: {}\n",
        endpoints.rpc_url, endpoints.geyser_url
    )
}
