//! `ufw status numbered` parsing
//!
//! The status report is loosely structured text. The only lines we accept
//! have the shape
//!
//! ```text
//! [<ordinal>] <port>[/<proto>] ALLOW IN <address>
//! ```
//!
//! Everything else (headers, `FWD` rules, `(v6)` port rules, comments) is
//! ignored. Any drift in the tool's format should only require changes here.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::ports::TargetPorts;

static RULE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\s*\d+\]\s+(\S+)\s+(?i:ALLOW IN)\s+(\S+)")
        .expect("rule line pattern is valid")
});

/// Source token meaning "any address". The IPv6 form `Anywhere (v6)` prints
/// its label as a separate token, so only the first word is compared.
const WILDCARD_ADDRESS: &str = "Anywhere";

/// One inbound allow for a concrete address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub port: String,
    pub address: String,
}

/// Parse one status line into a grant.
///
/// Returns `None` for lines outside the accepted grammar and for rules whose
/// source is a wildcard.
pub fn parse_rule_line(line: &str) -> Option<Grant> {
    let caps = RULE_LINE.captures(line.trim_end())?;
    let port_spec = caps.get(1)?.as_str();
    let address = caps.get(2)?.as_str();

    if address == WILDCARD_ADDRESS {
        return None;
    }

    let port = port_spec.split('/').next().unwrap_or(port_spec);
    Some(Grant {
        port: port.to_string(),
        address: address.to_string(),
    })
}

/// Address → granted target ports, built fresh from one status report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRecord {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl AccessRecord {
    pub fn ports_for(&self, address: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, grant: Grant) {
        self.entries
            .entry(grant.address)
            .or_default()
            .insert(grant.port);
    }

    /// Whether `address` holds every port in `targets`
    pub fn has_full_access(&self, address: &str, targets: &TargetPorts) -> bool {
        targets.is_configured()
            && self
                .entries
                .get(address)
                .is_some_and(|ports| targets.ports().all(|p| ports.contains(p)))
    }

    /// Entries that cover the whole target set, ordered by address
    pub fn full_access_rules(&self, targets: &TargetPorts) -> Vec<FullAccessRule> {
        if !targets.is_configured() {
            return Vec::new();
        }

        self.entries
            .keys()
            .filter(|address| self.has_full_access(address, targets))
            .map(|address| FullAccessRule {
                address: address.clone(),
                ports: targets.ports().map(str::to_string).collect(),
            })
            .collect()
    }
}

/// An address with simultaneous access to every target port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullAccessRule {
    pub address: String,
    pub ports: Vec<String>,
}

/// Build the access record for `targets` from a raw status report.
///
/// Pure: the same text always yields the same record, whatever the line order.
pub fn parse_status(raw: &str, targets: &TargetPorts) -> AccessRecord {
    let mut record = AccessRecord::default();
    for grant in raw.lines().filter_map(parse_rule_line) {
        if targets.contains(&grant.port) {
            record.insert(grant);
        }
    }
    record
}
