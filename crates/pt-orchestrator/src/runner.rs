//! External tools run as child processes

use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;

use pt_core::traits::{CommandRunner, ToolCommand};
use pt_core::ExperimentError;

/// Runs tools on this host with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    async fn exec(&self, command: &ToolCommand) -> Result<Output, ExperimentError> {
        tracing::debug!("$ {}", command);
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ExperimentError::Spawn {
                what: command.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ExperimentError::ToolFailed {
            tool: command.to_string(),
            reason: format!("{}: {}", output.status, stderr.trim()),
        })
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<(), ExperimentError> {
        self.exec(command).await.map(|_| ())
    }

    async fn output(&self, command: &ToolCommand) -> Result<String, ExperimentError> {
        let output = self.exec(command).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
