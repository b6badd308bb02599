//! In-memory stand-in for `ufw`, for exercising readers and mutators
//! without a real firewall.
//!
//! Understands `status numbered`, `allow from A to any port P` and
//! `delete allow from A to any port P`. Like ufw, duplicate allows and
//! deletes of missing rules succeed with an advisory on stderr.

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use crate::command::{CommandOutput, CommandRunner, ToolCommand};
use crate::error::{AccessError, Result};

const STATUS_HEADER: &str = "\
Status: active

     To                         Action      From
     --                         ------      ----
";

#[derive(Default)]
struct State {
    /// (port, address) pairs added through `allow`
    rules: Vec<(String, String)>,
    /// Raw lines appended verbatim after the managed rules
    extra_lines: Vec<String>,
    invocations: Vec<String>,
    fail_pattern: Option<String>,
}

#[derive(Default)]
pub struct ScriptedUfw {
    state: Mutex<State>,
}

impl ScriptedUfw {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with fixed status lines, e.g. rules added outside this process
    pub fn with_status_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ufw = Self::new();
        ufw.lock().extra_lines = lines.into_iter().map(Into::into).collect();
        ufw
    }

    pub fn push_status_line(&self, line: impl Into<String>) {
        self.lock().extra_lines.push(line.into());
    }

    /// Fail every command whose rendered form contains `pattern`
    pub fn fail_when(&self, pattern: impl Into<String>) {
        self.lock().fail_pattern = Some(pattern.into());
    }

    pub fn clear_failure(&self) {
        self.lock().fail_pattern = None;
    }

    /// Every command received so far, rendered as a string
    pub fn invocations(&self) -> Vec<String> {
        self.lock().invocations.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.lock()
            .invocations
            .iter()
            .filter(|c| c.ends_with("status numbered"))
            .count()
    }

    /// Number of rules added through `allow` and still present
    pub fn rule_count(&self) -> usize {
        self.lock().rules.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test may poison the lock; the state is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl State {
    fn render_status(&self) -> String {
        let mut out = String::from(STATUS_HEADER);
        for (i, (port, address)) in self.rules.iter().enumerate() {
            out.push_str(&format!("[{:>2}] {:<26} ALLOW IN    {}\n", i + 1, port, address));
        }
        for line in &self.extra_lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl CommandRunner for ScriptedUfw {
    async fn run(&self, command: &ToolCommand) -> Result<CommandOutput> {
        let rendered = command.to_string();
        let mut state = self.lock();
        state.invocations.push(rendered.clone());

        if let Some(pattern) = &state.fail_pattern {
            if rendered.contains(pattern.as_str()) {
                return Err(AccessError::external(&rendered, "exited with status 1: scripted failure"));
            }
        }

        let args: Vec<&str> = command.args().iter().map(String::as_str).collect();
        match args.as_slice() {
            ["status", "numbered"] => Ok(CommandOutput {
                stdout: state.render_status(),
                stderr: String::new(),
            }),
            ["allow", "from", address, "to", "any", "port", port] => {
                let rule = (port.to_string(), address.to_string());
                if state.rules.contains(&rule) {
                    Ok(CommandOutput {
                        stdout: "Skipping adding existing rule\n".into(),
                        stderr: String::new(),
                    })
                } else {
                    state.rules.push(rule);
                    Ok(CommandOutput {
                        stdout: "Rule added\n".into(),
                        stderr: String::new(),
                    })
                }
            }
            ["delete", "allow", "from", address, "to", "any", "port", port] => {
                let before = state.rules.len();
                state.rules.retain(|(p, a)| !(p == port && a == address));
                if state.rules.len() == before {
                    Ok(CommandOutput {
                        stdout: String::new(),
                        stderr: "Could not delete non-existent rule\n".into(),
                    })
                } else {
                    Ok(CommandOutput {
                        stdout: "Rule deleted\n".into(),
                        stderr: String::new(),
                    })
                }
            }
            _ => Err(AccessError::external(&rendered, "unsupported ufw invocation")),
        }
    }
}
