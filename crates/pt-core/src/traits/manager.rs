//! Manager link trait

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use pt_protocol::{is_ready_line, parse_port_line, ManagerCommand, TunnelId};

use crate::error::ChannelError;

/// A line-oriented session with one tunnel manager
///
/// Commands on one link are handled in send order. Every read is bounded;
/// a timeout abandons only that read.
#[async_trait]
pub trait ManagerLink: Send {
    /// Diagnostic label (`tsm` / `tcm`)
    fn label(&self) -> &str;

    /// Write one command line
    async fn send(&mut self, command: ManagerCommand) -> Result<(), ChannelError>;

    /// Read the next output line, waiting at most `timeout`
    async fn read_line(&mut self, timeout: Duration) -> Result<String, ChannelError>;

    /// Read lines until the manager announces it is running
    async fn wait_ready(&mut self, timeout: Duration) -> Result<String, ChannelError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ChannelError::Timeout(timeout));
            }
            let line = match self.read_line(remaining).await {
                Err(ChannelError::Timeout(_)) => return Err(ChannelError::Timeout(timeout)),
                other => other?,
            };
            if is_ready_line(&line) {
                return Ok(line);
            }
            tracing::debug!(manager = self.label(), %line, "output before ready");
        }
    }

    /// Poll tunnel `tunnel` until its program prints `Listening on port: <N>`
    ///
    /// Each poll requests one line with `tunnel <id> readline`. Any other
    /// output is skipped. The whole loop is bounded by `wait`.
    async fn read_port(&mut self, tunnel: TunnelId, wait: Duration) -> Result<u16, ChannelError> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ChannelError::NoPort(wait));
            }

            self.send(ManagerCommand::ReadLine(tunnel)).await?;
            let line = match self.read_line(remaining).await {
                Err(ChannelError::Timeout(_)) => return Err(ChannelError::NoPort(wait)),
                other => other?,
            };

            match parse_port_line(&line) {
                Ok(Some(port)) => return Ok(port),
                Ok(None) => {
                    tracing::debug!(manager = self.label(), %tunnel, %line, "skipping non-port output")
                }
                Err(e) => {
                    tracing::debug!(manager = self.label(), %tunnel, %line, "skipping malformed port line: {}", e)
                }
            }
        }
    }
}
