//! Experiment configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::serde_utils::duration_secs;
use super::RemoteHost;
use crate::error::ConfigError;
use crate::types::Side;

/// Configuration of one experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Congestion-control scheme under test
    pub cc: String,

    /// Number of flows, each in its own tunnel
    pub flows: u32,

    /// Total runtime, measured from the first flow start
    #[serde(with = "duration_secs")]
    pub runtime: Duration,

    /// Delay between consecutive flow starts
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Run number, used in every output file name
    pub run_id: u32,

    /// Remote side as `[user@]host:<pantheon dir>`; local run when unset
    pub remote: Option<String>,

    /// Host running the tunnel servers
    pub server_side: Side,

    /// Host running the senders
    pub sender_side: Side,

    /// Local address reachable from the remote host
    pub local_addr: Option<String>,

    /// Interface the local tunnel endpoint binds to
    pub local_if: Option<String>,

    /// Interface the remote tunnel endpoint binds to
    pub remote_if: Option<String>,

    /// NTP server used to measure clock offsets of remote runs
    pub ntp_addr: Option<String>,

    /// Root of the local experiment tree (`src/`, `test/`)
    pub pantheon_dir: PathBuf,

    /// Where raw per-flow logs go (default `<pantheon_dir>/tmp`)
    pub tmp_dir: Option<PathBuf>,

    /// Where final logs and stats go (default `<pantheon_dir>/test`)
    pub data_dir: Option<PathBuf>,

    /// Interpreter used to run scheme wrappers and tunnel managers
    pub python: String,

    /// Link shaper settings for local runs
    pub link: LinkShaperConfig,

    /// Bounded waits on manager output
    pub timeouts: TimeoutConfig,

    /// Tunnel connection retry budget
    pub handshake: HandshakeConfig,

    /// Flow start scheduling
    pub schedule: ScheduleConfig,

    /// Clock offset probing
    pub clock: ClockConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            cc: String::new(),
            flows: 1,
            runtime: Duration::from_secs(30),
            interval: Duration::ZERO,
            run_id: 1,
            remote: None,
            server_side: Side::Remote,
            sender_side: Side::Local,
            local_addr: None,
            local_if: None,
            remote_if: None,
            ntp_addr: None,
            pantheon_dir: PathBuf::from("."),
            tmp_dir: None,
            data_dir: None,
            python: "python".to_string(),
            link: LinkShaperConfig::default(),
            timeouts: TimeoutConfig::default(),
            handshake: HandshakeConfig::default(),
            schedule: ScheduleConfig::default(),
            clock: ClockConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Check invariants the run depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cc.is_empty() {
            return Err(ConfigError::MissingField("cc".to_string()));
        }
        if self.flows == 0 {
            return Err(ConfigError::Invalid(
                "flows must be at least 1 (runs without a tunnel are not supported)".to_string(),
            ));
        }
        if self.runtime.is_zero() {
            return Err(ConfigError::Invalid("runtime must be positive".to_string()));
        }
        if self.handshake.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "handshake.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.clock.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "clock.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.remote_host()?.is_some()
            && self.server_side == Side::Local
            && self.local_addr.is_none()
        {
            return Err(ConfigError::MissingField(
                "local_addr (required when the tunnel server runs locally in a remote run)"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed remote host, if this is a remote run
    pub fn remote_host(&self) -> Result<Option<RemoteHost>, ConfigError> {
        self.remote.as_deref().map(RemoteHost::parse).transpose()
    }

    /// Local scheme wrapper
    pub fn src_path(&self) -> PathBuf {
        self.pantheon_dir
            .join("src")
            .join(format!("{}.py", self.cc))
    }

    /// Local test directory
    pub fn test_dir(&self) -> PathBuf {
        self.pantheon_dir.join("test")
    }

    /// Local tunnel manager script
    pub fn tunnel_manager_path(&self) -> PathBuf {
        self.test_dir().join("tunnel_manager.py")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.tmp_dir
            .clone()
            .unwrap_or_else(|| self.pantheon_dir.join("tmp"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| self.test_dir())
    }
}

/// Link shaper (`mm-link`) settings for local runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkShaperConfig {
    /// Trace for the datalink, relative to the test directory
    pub datalink_trace: String,
    /// Trace for the acklink, relative to the test directory
    pub acklink_trace: String,
    /// Commands placed before `mm-link`
    pub prepend_mm_cmds: Option<String>,
    /// Commands placed after `mm-link` and its arguments
    pub append_mm_cmds: Option<String>,
    /// Extra `mm-link` arguments
    pub extra_mm_link_args: Option<String>,
}

impl Default for LinkShaperConfig {
    fn default() -> Self {
        Self {
            datalink_trace: "12mbps.trace".to_string(),
            acklink_trace: "12mbps.trace".to_string(),
            prepend_mm_cmds: None,
            append_mm_cmds: None,
            extra_mm_link_args: None,
        }
    }
}

/// Bounded waits on manager output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Wait for a manager's readiness line
    #[serde(with = "duration_secs")]
    pub manager_ready: Duration,

    /// Wait for the tunnel server's client command line
    #[serde(with = "duration_secs")]
    pub server_response: Duration,

    /// Wait for a tunnel client to report a connection, per launch
    #[serde(with = "duration_secs")]
    pub connect: Duration,

    /// Wait for a first program to announce its port
    #[serde(with = "duration_secs")]
    pub port: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            manager_ready: Duration::from_secs(60),
            server_response: Duration::from_secs(20),
            connect: Duration::from_secs(20),
            port: Duration::from_secs(10),
        }
    }
}

/// Tunnel connection retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Tunnel client launches before giving up
    pub max_attempts: u32,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// When the scheduler checks that flow starts fit in the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeasibilityCheck {
    /// Refuse to start any second-stage program if the offsets cannot fit
    Before,
    /// Only check once every program has been started
    After,
}

impl fmt::Display for FeasibilityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeasibilityCheck::Before => f.write_str("before"),
            FeasibilityCheck::After => f.write_str("after"),
        }
    }
}

impl FromStr for FeasibilityCheck {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(FeasibilityCheck::Before),
            "after" => Ok(FeasibilityCheck::After),
            other => Err(ConfigError::Invalid(format!(
                "feasibility check must be 'before' or 'after', got '{}'",
                other
            ))),
        }
    }
}

/// Flow start scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Pause after the last first-stage program, before any flow starts
    #[serde(with = "duration_secs")]
    pub settle_delay: Duration,

    /// When to check that all flow starts fit inside the runtime
    pub feasibility: FeasibilityCheck,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            feasibility: FeasibilityCheck::After,
        }
    }
}

/// Clock offset probing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Queries per host before the host is skipped
    pub max_attempts: u32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}
