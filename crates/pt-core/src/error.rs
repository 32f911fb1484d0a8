//! Core error types for pantheon experiments

use std::path::PathBuf;
use std::time::Duration;

use pt_protocol::{ProtocolError, TunnelId};
use thiserror::Error;

use crate::types::ManagerKind;

/// Top-level error type for an experiment run
#[derive(Error, Debug)]
pub enum ExperimentError {
    /// Manager channel error
    #[error("{manager} channel error: {source}")]
    Channel {
        manager: ManagerKind,
        #[source]
        source: ChannelError,
    },

    /// Manager never announced readiness
    #[error("{manager} did not report readiness within {timeout:?}")]
    ManagerNotReady {
        manager: ManagerKind,
        timeout: Duration,
    },

    /// Tunnel client never connected within the retry budget
    #[error("Cannot establish tunnel {tunnel} after {attempts} attempts")]
    HandshakeExhausted { tunnel: TunnelId, attempts: u32 },

    /// Flow start offsets do not fit inside the runtime
    #[error("Interval time between flows is too long: issuing took {elapsed:?} but runtime is {runtime:?} ({phase})")]
    SchedulingInfeasible {
        elapsed: Duration,
        runtime: Duration,
        phase: &'static str,
    },

    /// Clock offset query failed
    #[error("Failed to get clock offset: {0}")]
    ClockProbe(String),

    /// Fetching a log from the remote host failed
    #[error("Failed to copy {path:?} from remote host: {reason}")]
    RemoteCopy { path: PathBuf, reason: String },

    /// An external tool exited unsuccessfully
    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// Spawning a child process failed
    #[error("Failed to spawn {what}: {source}")]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExperimentError {
    /// Attach the manager a channel error came from
    pub fn channel(manager: ManagerKind) -> impl FnOnce(ChannelError) -> Self {
        move |source| Self::Channel { manager, source }
    }
}

/// Errors on a single manager channel
#[derive(Error, Debug)]
pub enum ChannelError {
    /// A bounded wait expired
    #[error("Timed out after {0:?} waiting for output")]
    Timeout(Duration),

    /// No port announcement arrived in time
    #[error("Cannot get port within {0:?}")]
    NoPort(Duration),

    /// The manager closed its output stream
    #[error("Manager output closed")]
    Closed,

    /// Framing or parse failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        Self::Protocol(ProtocolError::Io(err))
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
