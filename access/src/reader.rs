//! Rule store reader — queries ufw and derives access state on every call
//!
//! Nothing is cached: the firewall is the source of truth, so each query
//! runs `ufw status numbered` once and parses the fresh output.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::command::CommandRunner;
use crate::error::Result;
use crate::ports::TargetPorts;
use crate::status::{parse_rule_line, parse_status, AccessRecord, FullAccessRule};
use crate::ufw::Ufw;

/// Access state of one target port for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortAccess {
    pub role: String,
    pub port: String,
    pub granted: bool,
}

/// Per-port access flags for a single address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressAccess {
    pub address: String,
    pub ports: Vec<PortAccess>,
    pub full_access: bool,
}

impl AddressAccess {
    fn denied(address: &str, targets: &TargetPorts) -> Self {
        Self {
            address: address.to_string(),
            ports: targets
                .iter()
                .map(|t| PortAccess {
                    role: t.role.clone(),
                    port: t.port.clone(),
                    granted: false,
                })
                .collect(),
            full_access: false,
        }
    }

    pub fn is_granted(&self, port: &str) -> bool {
        self.ports.iter().any(|p| p.port == port && p.granted)
    }

    pub fn role_granted(&self, role: &str) -> bool {
        self.ports.iter().any(|p| p.role == role && p.granted)
    }

    pub fn missing_ports(&self) -> impl Iterator<Item = &PortAccess> {
        self.ports.iter().filter(|p| !p.granted)
    }
}

/// Scan a status report for one address, stopping once every target port is
/// confirmed.
fn scan_address_access(raw: &str, address: &str, targets: &TargetPorts) -> AddressAccess {
    let mut access = AddressAccess::denied(address, targets);
    let mut remaining = targets.len();

    for grant in raw.lines().filter_map(parse_rule_line) {
        if !grant.address.eq_ignore_ascii_case(address) {
            continue;
        }
        let Some(idx) = targets.position(&grant.port) else {
            continue;
        };
        let slot = &mut access.ports[idx];
        if !slot.granted {
            slot.granted = true;
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }
    }

    access.full_access = remaining == 0;
    access
}

pub struct RuleReader {
    runner: Arc<dyn CommandRunner>,
    ufw: Ufw,
    targets: TargetPorts,
}

impl RuleReader {
    pub fn new(runner: Arc<dyn CommandRunner>, ufw: Ufw, targets: TargetPorts) -> Self {
        Self {
            runner,
            ufw,
            targets,
        }
    }

    pub fn targets(&self) -> &TargetPorts {
        &self.targets
    }

    async fn fetch_status(&self) -> Result<String> {
        let output = self.runner.run(&self.ufw.status()).await?;
        Ok(output.stdout)
    }

    /// Current address → target port mapping
    pub async fn access_record(&self) -> Result<AccessRecord> {
        if !self.targets.is_configured() {
            return Ok(AccessRecord::default());
        }
        let raw = self.fetch_status().await?;
        Ok(parse_status(&raw, &self.targets))
    }

    /// Addresses holding every target port.
    ///
    /// Unconfigured target ports yield an empty list without touching ufw.
    pub async fn list_full_access_rules(&self) -> Result<Vec<FullAccessRule>> {
        if !self.targets.is_configured() {
            debug!("Target ports not configured; skipping rule listing");
            return Ok(Vec::new());
        }

        let record = self.access_record().await?;
        let rules = record.full_access_rules(&self.targets);
        info!(
            "Parsed {} addresses from ufw status, {} with full access",
            record.len(),
            rules.len()
        );
        Ok(rules)
    }

    /// Per-port access for `address` (matched case-insensitively)
    pub async fn check_address_access(&self, address: &str) -> Result<AddressAccess> {
        self.targets.require_configured()?;

        let raw = self.fetch_status().await?;
        let access = scan_address_access(&raw, address, &self.targets);
        debug!(
            "Access for {address}: {}",
            access
                .ports
                .iter()
                .map(|p| format!("{}={}", p.role, p.granted))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use crate::ports::TargetPort;
    use crate::testing::ScriptedUfw;

    fn targets() -> TargetPorts {
        TargetPorts::new(vec![
            TargetPort::new("rpc", "8899"),
            TargetPort::new("geyser", "11000"),
        ])
        .unwrap()
    }

    fn reader(ufw: &Arc<ScriptedUfw>, targets: TargetPorts) -> RuleReader {
        RuleReader::new(ufw.clone(), Ufw::default(), targets)
    }

    #[test]
    fn test_scan_case_insensitive_address() {
        let raw = "[ 1] 8899 ALLOW IN fe80::AB\n[ 2] 11000/tcp ALLOW IN FE80::ab\n";
        let access = scan_address_access(raw, "fe80::ab", &targets());
        assert!(access.full_access);
        assert!(access.role_granted("rpc"));
        assert!(access.role_granted("geyser"));
    }

    #[test]
    fn test_scan_partial() {
        let access = scan_address_access("[ 1] 8899/tcp ALLOW IN 10.0.0.5\n", "10.0.0.5", &targets());
        assert!(access.is_granted("8899"));
        assert!(!access.is_granted("11000"));
        assert!(!access.full_access);
        let missing: Vec<_> = access.missing_ports().map(|p| p.role.as_str()).collect();
        assert_eq!(missing, vec!["geyser"]);
    }

    #[test]
    fn test_scan_ignores_other_addresses_and_ports() {
        let raw = "[ 1] 8899 ALLOW IN 10.0.0.50\n[ 2] 22 ALLOW IN 10.0.0.5\n[ 3] 11000 ALLOW IN Anywhere\n";
        let access = scan_address_access(raw, "10.0.0.5", &targets());
        assert!(access.ports.iter().all(|p| !p.granted));
    }

    #[test]
    fn test_scan_duplicates_are_idempotent() {
        let raw = "[ 1] 8899 ALLOW IN 10.0.0.5\n[ 2] 8899/tcp ALLOW IN 10.0.0.5\n[ 3] 8899/udp ALLOW IN 10.0.0.5\n";
        let access = scan_address_access(raw, "10.0.0.5", &targets());
        assert!(access.is_granted("8899"));
        assert!(!access.full_access);
    }

    #[tokio::test]
    async fn test_list_full_access_rules() {
        let ufw = Arc::new(ScriptedUfw::with_status_lines([
            "[ 1] 8899/tcp ALLOW IN 10.0.0.5",
            "[ 2] 11000 ALLOW IN 10.0.0.5",
        ]));
        let rules = reader(&ufw, targets()).list_full_access_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].address, "10.0.0.5");
        assert_eq!(rules[0].ports, vec!["8899", "11000"]);
    }

    #[tokio::test]
    async fn test_partial_grant_hidden_from_listing_but_visible_to_check() {
        let ufw = Arc::new(ScriptedUfw::with_status_lines(["[ 1] 8899/tcp ALLOW IN 10.0.0.5"]));
        let reader = reader(&ufw, targets());

        assert!(reader.list_full_access_rules().await.unwrap().is_empty());

        let access = reader.check_address_access("10.0.0.5").await.unwrap();
        assert!(access.role_granted("rpc"));
        assert!(!access.role_granted("geyser"));
    }

    #[tokio::test]
    async fn test_wildcard_non_target_contributes_nothing() {
        let ufw = Arc::new(ScriptedUfw::with_status_lines(["[ 1] 22/tcp ALLOW IN Anywhere"]));
        let record = reader(&ufw, targets()).access_record().await.unwrap();
        assert!(record.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_listing_skips_tool() {
        let ufw = Arc::new(ScriptedUfw::new());
        let rules = reader(&ufw, TargetPorts::unconfigured())
            .list_full_access_rules()
            .await
            .unwrap();
        assert!(rules.is_empty());
        assert!(ufw.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_check_is_configuration_error() {
        let ufw = Arc::new(ScriptedUfw::new());
        let err = reader(&ufw, TargetPorts::unconfigured())
            .check_address_access("10.0.0.5")
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Configuration(_)));
        assert!(ufw.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_status_failure_propagates() {
        let ufw = Arc::new(ScriptedUfw::new());
        ufw.fail_when("status");
        let reader = reader(&ufw, targets());

        assert!(matches!(
            reader.list_full_access_rules().await,
            Err(AccessError::ExternalTool { .. })
        ));
        assert!(matches!(
            reader.check_address_access("10.0.0.5").await,
            Err(AccessError::ExternalTool { .. })
        ));
    }

    #[tokio::test]
    async fn test_every_query_reads_fresh_state() {
        let ufw = Arc::new(ScriptedUfw::new());
        let reader = reader(&ufw, targets());

        assert!(reader.list_full_access_rules().await.unwrap().is_empty());
        ufw.push_status_line("[ 1] 8899 ALLOW IN 10.0.0.5");
        ufw.push_status_line("[ 2] 11000 ALLOW IN 10.0.0.5");
        assert_eq!(reader.list_full_access_rules().await.unwrap().len(), 1);

        assert_eq!(ufw.status_calls(), 2);
    }

    #[test]
    fn test_address_access_serializes_roles() {
        let access = scan_address_access("[ 1] 8899 ALLOW IN 10.0.0.5\n", "10.0.0.5", &targets());
        let json = serde_json::to_value(&access).unwrap();
        assert_eq!(json["address"], "10.0.0.5");
        assert_eq!(json["full_access"], false);
        assert_eq!(json["ports"][0]["role"], "rpc");
        assert_eq!(json["ports"][0]["granted"], true);
        assert_eq!(json["ports"][1]["granted"], false);
    }
}
