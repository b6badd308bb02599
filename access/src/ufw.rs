//! ufw command shapes

use crate::command::ToolCommand;

pub const DEFAULT_UFW_BINARY: &str = "ufw";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ufw {
    binary: String,
}

impl Ufw {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `ufw status numbered`
    pub fn status(&self) -> ToolCommand {
        ToolCommand::new(self.binary.as_str(), ["status", "numbered"])
    }

    /// `ufw allow from <address> to any port <port>`
    pub fn allow(&self, address: &str, port: &str) -> ToolCommand {
        ToolCommand::new(
            self.binary.as_str(),
            ["allow", "from", address, "to", "any", "port", port],
        )
    }

    /// `ufw delete allow from <address> to any port <port>`
    pub fn delete_allow(&self, address: &str, port: &str) -> ToolCommand {
        ToolCommand::new(
            self.binary.as_str(),
            ["delete", "allow", "from", address, "to", "any", "port", port],
        )
    }
}

impl Default for Ufw {
    fn default() -> Self {
        Self::new(DEFAULT_UFW_BINARY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_shapes() {
        let ufw = Ufw::default();
        assert_eq!(ufw.status().to_string(), "ufw status numbered");
        assert_eq!(
            ufw.allow("10.0.0.5", "8899").to_string(),
            "ufw allow from 10.0.0.5 to any port 8899"
        );
        assert_eq!(
            ufw.delete_allow("10.0.0.5", "11000").to_string(),
            "ufw delete allow from 10.0.0.5 to any port 11000"
        );
    }

    #[test]
    fn test_custom_binary() {
        let ufw = Ufw::new("/usr/sbin/ufw");
        assert_eq!(ufw.status().program(), "/usr/sbin/ufw");
    }
}
