//! Rule mutator — per-port grant/revoke commands against ufw
//!
//! Full-access changes are issued port by port, in target order. There is no
//! rollback: if port *k* fails, earlier ports stay changed, later ports are
//! not attempted and the failing port's error is returned.

use std::sync::Arc;
use tracing::info;

use crate::command::{CommandRunner, ToolCommand};
use crate::error::{AccessError, Result};
use crate::ports::TargetPorts;
use crate::ufw::Ufw;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Grant,
    Revoke,
}

impl Change {
    fn verb(self) -> &'static str {
        match self {
            Change::Grant => "added",
            Change::Revoke => "deleted",
        }
    }
}

pub struct RuleMutator {
    runner: Arc<dyn CommandRunner>,
    ufw: Ufw,
    targets: TargetPorts,
}

impl RuleMutator {
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

    fn command(&self, change: Change, address: &str, port: &str) -> ToolCommand {
        match change {
            Change::Grant => self.ufw.allow(address, port),
            Change::Revoke => self.ufw.delete_allow(address, port),
        }
    }

    async fn apply(&self, change: Change, address: &str, port: &str) -> Result<()> {
        self.runner
            .run(&self.command(change, address, port))
            .await?;
        info!("Rule {} for {address}, port {port}", change.verb());
        Ok(())
    }

    async fn apply_all(&self, change: Change, address: &str) -> Result<()> {
        self.targets.require_configured()?;
        for port in self.targets.ports() {
            self.apply(change, address, port).await?;
        }
        info!("All target port rules {} for {address}", change.verb());
        Ok(())
    }

    fn ensure_target_port(&self, port: &str) -> Result<()> {
        self.targets.require_configured()?;
        if self.targets.contains(port) {
            Ok(())
        } else {
            Err(AccessError::InvalidPort {
                port: port.to_string(),
            })
        }
    }

    /// Allow `address` on every target port
    pub async fn grant_full_access(&self, address: &str) -> Result<()> {
        self.apply_all(Change::Grant, address).await
    }

    /// Remove the allow rules for `address` on every target port
    pub async fn revoke_full_access(&self, address: &str) -> Result<()> {
        self.apply_all(Change::Revoke, address).await
    }

    pub async fn grant_single_port(&self, address: &str, port: &str) -> Result<()> {
        self.ensure_target_port(port)?;
        self.apply(Change::Grant, address, port).await
    }

    pub async fn revoke_single_port(&self, address: &str, port: &str) -> Result<()> {
        self.ensure_target_port(port)?;
        self.apply(Change::Revoke, address, port).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::TargetPort;
    use crate::testing::ScriptedUfw;

    fn targets() -> TargetPorts {
        TargetPorts::new(vec![
            TargetPort::new("rpc", "8899"),
            TargetPort::new("geyser", "11000"),
        ])
        .unwrap()
    }

    fn mutator(ufw: &Arc<ScriptedUfw>, targets: TargetPorts) -> RuleMutator {
        RuleMutator::new(ufw.clone(), Ufw::default(), targets)
    }

    #[tokio::test]
    async fn test_grant_full_access_in_target_order() {
        let ufw = Arc::new(ScriptedUfw::new());
        mutator(&ufw, targets()).grant_full_access("10.0.0.5").await.unwrap();
        assert_eq!(
            ufw.invocations(),
            vec![
                "ufw allow from 10.0.0.5 to any port 8899",
                "ufw allow from 10.0.0.5 to any port 11000",
            ]
        );
        assert_eq!(ufw.rule_count(), 2);
    }

    #[tokio::test]
    async fn test_revoke_full_access_in_target_order() {
        let ufw = Arc::new(ScriptedUfw::new());
        mutator(&ufw, targets()).revoke_full_access("10.0.0.5").await.unwrap();
        assert_eq!(
            ufw.invocations(),
            vec![
                "ufw delete allow from 10.0.0.5 to any port 8899",
                "ufw delete allow from 10.0.0.5 to any port 11000",
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_stops_at_failing_port() {
        let ufw = Arc::new(ScriptedUfw::new());
        ufw.fail_when("port 11000");
        let err = mutator(&ufw, targets())
            .grant_full_access("10.0.0.5")
            .await
            .unwrap_err();

        match err {
            AccessError::ExternalTool { command, .. } => assert!(command.ends_with("port 11000")),
            other => panic!("unexpected error: {other:?}"),
        }
        // First port stays granted
        assert_eq!(ufw.rule_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_on_first_port_attempts_nothing_else() {
        let ufw = Arc::new(ScriptedUfw::new());
        ufw.fail_when("port 8899");
        assert!(mutator(&ufw, targets()).revoke_full_access("10.0.0.5").await.is_err());
        assert_eq!(ufw.invocations().len(), 1);
    }

    #[tokio::test]
    async fn test_single_port_rejects_non_target() {
        let ufw = Arc::new(ScriptedUfw::new());
        let m = mutator(&ufw, targets());

        let err = m.grant_single_port("10.0.0.5", "22").await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidPort { ref port } if port == "22"));
        let err = m.revoke_single_port("10.0.0.5", "8899/tcp").await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidPort { .. }));
        assert!(ufw.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_single_port_issues_one_command() {
        let ufw = Arc::new(ScriptedUfw::new());
        let m = mutator(&ufw, targets());
        m.grant_single_port("10.0.0.5", "11000").await.unwrap();
        m.revoke_single_port("10.0.0.5", "11000").await.unwrap();
        assert_eq!(
            ufw.invocations(),
            vec![
                "ufw allow from 10.0.0.5 to any port 11000",
                "ufw delete allow from 10.0.0.5 to any port 11000",
            ]
        );
        assert_eq!(ufw.rule_count(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_mutations_skip_tool() {
        let ufw = Arc::new(ScriptedUfw::new());
        let m = mutator(&ufw, TargetPorts::unconfigured());

        assert!(matches!(
            m.grant_full_access("10.0.0.5").await,
            Err(AccessError::Configuration(_))
        ));
        assert!(matches!(
            m.revoke_full_access("10.0.0.5").await,
            Err(AccessError::Configuration(_))
        ));
        assert!(matches!(
            m.grant_single_port("10.0.0.5", "8899").await,
            Err(AccessError::Configuration(_))
        ));
        assert!(ufw.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_grant_twice_and_revoke_missing_do_not_error() {
        let ufw = Arc::new(ScriptedUfw::new());
        let m = mutator(&ufw, targets());
        m.grant_full_access("10.0.0.5").await.unwrap();
        m.grant_full_access("10.0.0.5").await.unwrap();
        assert_eq!(ufw.rule_count(), 2);

        m.revoke_full_access("10.0.0.9").await.unwrap();
        assert_eq!(ufw.rule_count(), 2);
    }
}
