//! portgate access — per-address access to a fixed set of service ports,
//! managed through `ufw`.
//!
//! - [`reader::RuleReader`] parses `ufw status numbered` into access records
//! - [`mutator::RuleMutator`] issues per-port allow/delete commands
//! - [`command::CommandRunner`] is the single privileged execution point

pub mod command;
pub mod error;
pub mod mutator;
pub mod ports;
pub mod reader;
pub mod status;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod ufw;

use std::sync::Arc;

pub use command::{CommandOutput, CommandRunner, PrivilegedRunner, ToolCommand};
pub use error::{AccessError, Result};
pub use mutator::RuleMutator;
pub use ports::{TargetPort, TargetPorts};
pub use reader::{AddressAccess, PortAccess, RuleReader};
pub use status::{parse_status, AccessRecord, FullAccessRule};
pub use ufw::Ufw;

/// Reader and mutator sharing one runner and one target port set
pub struct AccessControl {
    pub reader: RuleReader,
    pub mutator: RuleMutator,
}

impl AccessControl {
    pub fn new(runner: Arc<dyn CommandRunner>, ufw: Ufw, targets: TargetPorts) -> Self {
        Self {
            reader: RuleReader::new(runner.clone(), ufw.clone(), targets.clone()),
            mutator: RuleMutator::new(runner, ufw, targets),
        }
    }

    pub fn targets(&self) -> &TargetPorts {
        self.reader.targets()
    }

    /// Grant full access, then read back the resulting per-port state
    pub async fn grant_and_verify(&self, address: &str) -> Result<AddressAccess> {
        self.mutator.grant_full_access(address).await?;
        self.reader.check_address_access(address).await
    }

    /// Revoke full access, then read back the resulting per-port state
    pub async fn revoke_and_verify(&self, address: &str) -> Result<AddressAccess> {
        self.mutator.revoke_full_access(address).await?;
        self.reader.check_address_access(address).await
    }
}
