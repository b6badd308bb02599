//! Error taxonomy shared by the reader, the mutator and the command runner

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    /// Target ports are missing or malformed at call time
    #[error("Target ports are not configured: {0}")]
    Configuration(String),

    /// The external tool could not be spawned or exited unsuccessfully
    #[error("Firewall command `{command}` failed: {message}")]
    ExternalTool { command: String, message: String },

    /// A single-port mutation named a port outside the target set
    #[error("Port {port} is not a target port")]
    InvalidPort { port: String },

    #[error("Invalid IPv4 address: {address}")]
    InvalidAddress { address: String },
}

impl AccessError {
    pub(crate) fn external(command: impl ToString, message: impl Into<String>) -> Self {
        Self::ExternalTool {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Whether the error was caused by caller input rather than the server side
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidPort { .. } | Self::InvalidAddress { .. })
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
