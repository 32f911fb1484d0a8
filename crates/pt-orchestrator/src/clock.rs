//! Clock offset measurement against an NTP server
//!
//! A host that cannot be queried is skipped; the run goes on without its
//! offset.

use pt_core::config::RemoteHost;
use pt_core::retry::{retry_bounded, RetryError};
use pt_core::traits::{CommandRunner, ToolCommand};
use pt_core::{ExperimentError, ExperimentResult};

/// Offset in milliseconds from `ntpdate -quv` output
///
/// The offset in seconds is the second-to-last token of the output.
pub fn parse_offset(output: &str) -> Result<f64, ExperimentError> {
    let tokens: Vec<&str> = output.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(ExperimentError::ClockProbe(format!(
            "unexpected ntpdate output: '{}'",
            output.trim()
        )));
    }
    let raw = tokens[tokens.len() - 2];
    let seconds: f64 = raw
        .parse()
        .map_err(|_| ExperimentError::ClockProbe(format!("'{}' is not an offset", raw)))?;
    Ok(seconds.abs() * 1000.0)
}

/// Queries the local and (for remote runs) the remote clock
pub struct ClockOffsetProbe<'a, R: ?Sized> {
    runner: &'a R,
    ntp_addr: String,
    remote: Option<RemoteHost>,
    max_attempts: u32,
}

impl<'a, R: CommandRunner + ?Sized> ClockOffsetProbe<'a, R> {
    pub fn new(
        runner: &'a R,
        ntp_addr: impl Into<String>,
        remote: Option<RemoteHost>,
        max_attempts: u32,
    ) -> Self {
        Self {
            runner,
            ntp_addr: ntp_addr.into(),
            remote,
            max_attempts,
        }
    }

    /// `ntpdate` invocations, local first
    pub fn targets(&self) -> Vec<(String, ToolCommand)> {
        let ntpdate = ["ntpdate", "-quv", self.ntp_addr.as_str()];

        let mut targets = vec![(
            "local".to_string(),
            ToolCommand::new(ntpdate[0]).args(ntpdate[1..].iter().copied()),
        )];
        if let Some(remote) = &self.remote {
            let mut argv = remote.ssh_cmd();
            argv.extend(ntpdate.iter().map(|s| s.to_string()));
            if let Some(cmd) = ToolCommand::from_argv(&argv) {
                targets.push((remote.addr.clone(), cmd));
            }
        }
        targets
    }

    /// Probe every target and keep the worst offset in `result`
    pub async fn probe(&self, result: &mut ExperimentResult) {
        for (host, cmd) in self.targets() {
            let cmd = &cmd;
            let outcome = retry_bounded(
                self.max_attempts,
                |e: &ExperimentError| !matches!(e, ExperimentError::Config(_)),
                |_| self.query(cmd),
            )
            .await;

            match outcome {
                Ok(ofst) => {
                    tracing::info!("Clock offset of {}: {} ms", host, ofst);
                    result.record_offset(ofst);
                }
                Err(RetryError::Exhausted { attempts, last }) => {
                    tracing::warn!(
                        "Skipping clock offset of {} after {} attempts: {}",
                        host,
                        attempts,
                        last
                    );
                }
                Err(RetryError::Aborted(e)) => {
                    tracing::warn!("Skipping clock offset of {}: {}", host, e);
                }
            }
        }
    }

    async fn query(&self, cmd: &ToolCommand) -> Result<f64, ExperimentError> {
        let output = self
            .runner
            .output(cmd)
            .await
            .map_err(|e| ExperimentError::ClockProbe(e.to_string()))?;
        parse_offset(&output)
    }
}
