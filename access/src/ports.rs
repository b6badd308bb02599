//! Target port set — the fixed list of service ports that defines "full access"
//!
//! Built once at startup and never mutated. An empty set is the degraded
//! "unconfigured" state: readers and mutators refuse to touch the firewall.

use serde::Serialize;
use tracing::warn;

use crate::error::{AccessError, Result};

/// One service port together with the role it plays (e.g. `rpc`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetPort {
    pub role: String,
    pub port: String,
}

impl TargetPort {
    pub fn new(role: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            port: port.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetPorts {
    ports: Vec<TargetPort>,
}

impl TargetPorts {
    /// Build a port set, rejecting malformed or duplicate ports
    pub fn new(ports: Vec<TargetPort>) -> Result<Self> {
        let mut seen: Vec<&str> = Vec::with_capacity(ports.len());
        for target in &ports {
            if !is_port_token(&target.port) {
                return Err(AccessError::Configuration(format!(
                    "{} port {:?} is not a valid port number",
                    target.role, target.port
                )));
            }
            if seen.contains(&target.port.as_str()) {
                return Err(AccessError::Configuration(format!(
                    "port {} is listed more than once",
                    target.port
                )));
            }
            seen.push(&target.port);
        }
        Ok(Self { ports })
    }

    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Build a port set from optional `(role, port)` values as read from the
    /// environment. If any role is missing or malformed the whole set is
    /// left unconfigured.
    pub fn from_optional(values: &[(&str, Option<&str>)]) -> Self {
        let mut ports = Vec::with_capacity(values.len());
        for (role, value) in values {
            match value.map(str::trim).filter(|v| !v.is_empty()) {
                Some(port) => ports.push(TargetPort::new(*role, port)),
                None => {
                    warn!("No {role} port configured; access management is disabled");
                    return Self::unconfigured();
                }
            }
        }

        match Self::new(ports) {
            Ok(set) => set,
            Err(e) => {
                warn!("{e}; access management is disabled");
                Self::unconfigured()
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.ports.is_empty()
    }

    /// Fail with a configuration error if the set is empty
    pub fn require_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(AccessError::Configuration(
                "no target ports are configured".into(),
            ))
        }
    }

    pub fn contains(&self, port: &str) -> bool {
        self.ports.iter().any(|t| t.port == port)
    }

    pub fn position(&self, port: &str) -> Option<usize> {
        self.ports.iter().position(|t| t.port == port)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetPort> {
        self.ports.iter()
    }

    pub fn ports(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|t| t.port.as_str())
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// A plain decimal port in 1..=65535
fn is_port_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_digit())
        && s.parse::<u16>().map(|p| p != 0).unwrap_or(false)
}
