//! Command execution primitive
//!
//! Every firewall invocation, read or write, goes through a [`CommandRunner`].
//! [`PrivilegedRunner`] is the production implementation: it prefixes the
//! command with the privilege helper (`sudo -n` by default), waits for the
//! process to exit and captures stdout/stderr as text.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::error::{AccessError, Result};

/// A single external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured output of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput>;
}

/// Runs commands through a privilege helper such as `sudo`
#[derive(Debug, Clone)]
pub struct PrivilegedRunner {
    helper: Option<String>,
    non_interactive: bool,
}

impl PrivilegedRunner {
    pub fn new(helper: Option<String>, non_interactive: bool) -> Self {
        Self {
            helper: helper.filter(|h| !h.trim().is_empty()),
            non_interactive,
        }
    }

    /// `sudo -n <command>`; fails instead of prompting for a password
    pub fn sudo() -> Self {
        Self::new(Some("sudo".into()), true)
    }

    /// Run commands as the current user
    pub fn direct() -> Self {
        Self::new(None, false)
    }

    /// The command line that will actually be spawned
    pub fn invocation(&self, command: &ToolCommand) -> ToolCommand {
        match &self.helper {
            Some(helper) => {
                let mut args = Vec::with_capacity(command.args.len() + 2);
                if self.non_interactive {
                    args.push("-n".to_string());
                }
                args.push(command.program.clone());
                args.extend(command.args.iter().cloned());
                ToolCommand::new(helper.clone(), args)
            }
            None => command.clone(),
        }
    }
}

impl Default for PrivilegedRunner {
    fn default() -> Self {
        Self::sudo()
    }
}

#[async_trait]
impl CommandRunner for PrivilegedRunner {
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let invocation = self.invocation(command);
        info!("Executing firewall command: {invocation}");

        let output = Command::new(invocation.program())
            .args(invocation.args())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                error!("Failed to spawn firewall command `{invocation}`: {e}");
                AccessError::external(&invocation, format!("failed to spawn: {e}"))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let reason = match output.status.code() {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            };
            let message = if stderr.trim().is_empty() {
                reason
            } else {
                format!("{reason}: {}", stderr.trim())
            };
            error!("Firewall command `{invocation}` failed: {message}");
            return Err(AccessError::external(&invocation, message));
        }

        // ufw prints advisory text on stderr even when it succeeds
        if !stderr.trim().is_empty() {
            warn!("Firewall command stderr: {}", stderr.trim());
        }

        Ok(CommandOutput { stdout, stderr })
    }
}
