//! portgate configuration loading and parsing

use anyhow::{Context, Result};
use portgate_access::{PrivilegedRunner, TargetPorts, Ufw};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "/etc/portgate/config.toml";

/// Root configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct PortgateConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub firewall: FirewallConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FirewallConfig {
    #[serde(default = "default_ufw_binary")]
    pub ufw_binary: String,
    /// Empty string runs ufw without a privilege helper
    #[serde(default = "default_privilege_helper")]
    pub privilege_helper: String,
    #[serde(default = "default_true")]
    pub non_interactive: bool,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            ufw_binary: default_ufw_binary(),
            privilege_helper: default_privilege_helper(),
            non_interactive: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceConfig {
    pub rpc_port: Option<String>,
    pub geyser_port: Option<String>,
    pub public_ip: Option<String>,
}

// Default value functions
fn default_log_level() -> String { "info".into() }
fn default_ufw_binary() -> String { "ufw".into() }
fn default_privilege_helper() -> String { "sudo".into() }
fn default_true() -> bool { true }

impl PortgateConfig {
    /// Let `RPC_PORT`, `GEYSER_PORT` and `SERVER_PUBLIC_IP` override the file
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = non_empty("RPC_PORT") {
            self.service.rpc_port = Some(port);
        }
        if let Some(port) = non_empty("GEYSER_PORT") {
            self.service.geyser_port = Some(port);
        }
        if let Some(ip) = non_empty("SERVER_PUBLIC_IP") {
            self.service.public_ip = Some(ip);
        }
    }

    pub fn target_ports(&self) -> TargetPorts {
        TargetPorts::from_optional(&[
            ("rpc", self.service.rpc_port.as_deref()),
            ("geyser", self.service.geyser_port.as_deref()),
        ])
    }

    pub fn runner(&self) -> PrivilegedRunner {
        PrivilegedRunner::new(
            Some(self.firewall.privilege_helper.clone()),
            self.firewall.non_interactive,
        )
    }

    pub fn ufw(&self) -> Ufw {
        Ufw::new(self.firewall.ufw_binary.clone())
    }
}

fn read_config(path: &Path) -> Result<PortgateConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let mut config: PortgateConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;
    config.source = Some(path.to_path_buf());
    Ok(config)
}

/// Load configuration and apply environment overrides.
///
/// An explicit path must exist; otherwise `PORTGATE_CONFIG` or
/// /etc/portgate/config.toml is used when present, and defaults when not.
pub fn load_config(explicit: Option<&Path>) -> Result<PortgateConfig> {
    let mut config = match explicit {
        Some(path) => read_config(path)?,
        None => {
            let path = std::env::var("PORTGATE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
            if path.exists() {
                read_config(&path)?
            } else {
                PortgateConfig::default()
            }
        }
    };

    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}
