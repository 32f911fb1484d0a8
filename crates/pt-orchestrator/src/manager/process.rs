//! Spawned tunnel manager processes
//!
//! Each manager runs in its own process group so that everything it
//! starts (tunnels, schemes, ssh sessions) can be torn down at once.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use pt_core::traits::ManagerLink;
use pt_core::{ChannelError, ExperimentError, ManagerKind};
use pt_protocol::ManagerCommand;

use super::ManagerChannel;

/// Send SIGTERM to every process in group `pgid`
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) -> io::Result<()> {
    // ESRCH means the group is already gone
    let result = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGTERM) };
    if result == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
pub fn kill_process_group(_pgid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process groups are only supported on unix",
    ))
}

/// A running tunnel manager and the channel to it
pub struct ManagerProcess {
    kind: ManagerKind,
    child: Child,
    channel: ManagerChannel<ChildStdout, ChildStdin>,
    pgid: Option<u32>,
    terminated: bool,
}

impl ManagerProcess {
    /// Spawn `argv` with piped stdin/stdout in a fresh process group
    pub fn spawn(kind: ManagerKind, argv: &[String]) -> Result<Self, ExperimentError> {
        let (program, args) = argv.split_first().ok_or_else(|| ExperimentError::Spawn {
            what: kind.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command line"),
        })?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        tracing::info!("Starting {}: {}", kind, argv.join(" "));
        let spawn_err = |source| ExperimentError::Spawn {
            what: kind.to_string(),
            source,
        };
        let mut child = command.spawn().map_err(spawn_err)?;

        let missing = |pipe: &str| ExperimentError::Spawn {
            what: kind.to_string(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, format!("{} not piped", pipe)),
        };
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;

        // With process_group(0) the group id is the child's pid
        let pgid = child.id();

        Ok(Self {
            kind,
            child,
            channel: ManagerChannel::new(kind.label(), stdout, stdin),
            pgid,
            terminated: false,
        })
    }

    /// Spawn, wait for the readiness line, then set the manager's prompt
    pub async fn start(
        kind: ManagerKind,
        argv: &[String],
        ready_timeout: Duration,
    ) -> Result<Self, ExperimentError> {
        let mut process = Self::spawn(kind, argv)?;

        match process.channel.wait_ready(ready_timeout).await {
            Ok(_) => {}
            Err(ChannelError::Timeout(_)) => {
                return Err(ExperimentError::ManagerNotReady {
                    manager: kind,
                    timeout: ready_timeout,
                })
            }
            Err(e) => return Err(ExperimentError::channel(kind)(e)),
        }
        tracing::info!("{} is running", kind);

        let prompt = ManagerCommand::Prompt(format!("[{}]", kind.label()));
        process
            .channel
            .send(prompt)
            .await
            .map_err(ExperimentError::channel(kind))?;

        Ok(process)
    }

    pub fn kind(&self) -> ManagerKind {
        self.kind
    }

    pub fn pgid(&self) -> Option<u32> {
        self.pgid
    }

    /// Give the manager `grace` to exit on its own, then kill its group
    pub async fn shutdown(&mut self, grace: Duration) {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => tracing::debug!("{} exited with {}", self.kind, status),
            Ok(Err(e)) => tracing::warn!("Failed to wait for {}: {}", self.kind, e),
            Err(_) => tracing::debug!("{} still running after {:?}", self.kind, grace),
        }
        self.terminate();
    }

    /// Terminate the manager's whole process group
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        match self.pgid {
            Some(pgid) if cfg!(unix) => {
                if let Err(e) = kill_process_group(pgid) {
                    tracing::warn!("Failed to kill process group {} of {}: {}", pgid, self.kind, e);
                }
            }
            _ => {
                if let Err(e) = self.child.start_kill() {
                    tracing::debug!("Failed to kill {}: {}", self.kind, e);
                }
            }
        }
    }
}

#[async_trait]
impl ManagerLink for ManagerProcess {
    fn label(&self) -> &str {
        self.channel.label()
    }

    async fn send(&mut self, command: ManagerCommand) -> Result<(), ChannelError> {
        self.channel.send(command).await
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, ChannelError> {
        self.channel.read_line(timeout).await
    }
}

impl Drop for ManagerProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
