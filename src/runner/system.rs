use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, CommandRunner, Invocation, Io};
use crate::error::{AutomationError, Result};

/// Runs invocations as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        debug!(command = %invocation, effect = ?invocation.effect, "running");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        let spawn_err = |source| AutomationError::Spawn {
            command: invocation.to_string(),
            source,
        };

        let output = match invocation.io {
            Io::Captured => {
                let output = cmd
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(spawn_err)?;
                CommandOutput {
                    code: output.status.code(),
                    success: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
            Io::Inherited => {
                let status = cmd
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(spawn_err)?;
                CommandOutput {
                    code: status.code(),
                    success: status.success(),
                    ..CommandOutput::default()
                }
            }
        };

        debug!(command = %invocation, code = ?output.code, success = output.success, "finished");
        Ok(output)
    }

    fn locate(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
