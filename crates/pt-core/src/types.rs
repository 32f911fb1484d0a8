//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Which host a component runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    /// The other host
    pub fn opposite(self) -> Self {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Local => "local",
            Side::Remote => "remote",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Side::Local),
            "remote" => Ok(Side::Remote),
            other => Err(ConfigError::Invalid(format!(
                "side must be 'local' or 'remote', got '{}'",
                other
            ))),
        }
    }
}

/// Role a scheme instance plays in a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    /// The peer's role
    pub fn opposite(self) -> Self {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sender => "sender",
            Role::Receiver => "receiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sender" => Ok(Role::Sender),
            "receiver" => Ok(Role::Receiver),
            other => Err(ConfigError::Invalid(format!(
                "need to specify receiver or sender first, got '{}'",
                other
            ))),
        }
    }
}

/// One of the two emulated directional paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    /// Forward data path
    Datalink,
    /// Reverse acknowledgment path
    Acklink,
}

impl Link {
    /// Both links, datalink first
    pub const ALL: [Link; 2] = [Link::Datalink, Link::Acklink];

    pub fn as_str(&self) -> &'static str {
        match self {
            Link::Datalink => "datalink",
            Link::Acklink => "acklink",
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two tunnel managers of an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerKind {
    /// Hosts the tunnel servers
    TunnelServer,
    /// Hosts the tunnel clients
    TunnelClient,
}

impl ManagerKind {
    /// Short label used in prompts and diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            ManagerKind::TunnelServer => "tsm",
            ManagerKind::TunnelClient => "tcm",
        }
    }

    /// The other manager
    pub fn other(self) -> Self {
        match self {
            ManagerKind::TunnelServer => ManagerKind::TunnelClient,
            ManagerKind::TunnelClient => ManagerKind::TunnelServer,
        }
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagerKind::TunnelServer => f.write_str("tunnel server manager (tsm)"),
            ManagerKind::TunnelClient => f.write_str("tunnel client manager (tcm)"),
        }
    }
}

/// Merged per-flow logs produced by the first merge stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedFlowLogs {
    pub datalink: PathBuf,
    pub acklink: PathBuf,
}

impl MergedFlowLogs {
    pub fn get(&self, link: Link) -> &PathBuf {
        match link {
            Link::Datalink => &self.datalink,
            Link::Acklink => &self.acklink,
        }
    }
}

/// Accumulated outcome of one experiment
///
/// Only the scheduler, merger and clock probe write to this.
#[derive(Debug, Clone, Default)]
pub struct ExperimentResult {
    /// Nominal start, when the first second-stage program was issued
    pub test_start_time: Option<String>,
    /// Nominal end, when both managers were halted
    pub test_end_time: Option<String>,
    /// Worst absolute clock offset in milliseconds
    pub worst_abs_ofst: Option<f64>,
    /// Per-flow merged logs, in flow order
    pub merged: Vec<MergedFlowLogs>,
}

impl ExperimentResult {
    /// Record an observed offset, keeping only the worst one
    pub fn record_offset(&mut self, ofst_ms: f64) {
        match self.worst_abs_ofst {
            Some(worst) if worst >= ofst_ms => {}
            _ => self.worst_abs_ofst = Some(ofst_ms),
        }
    }

    /// Text of the stats file
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Start at: {}\nEnd at: {}\n",
            self.test_start_time.as_deref().unwrap_or("-"),
            self.test_end_time.as_deref().unwrap_or("-"),
        );
        if let Some(ofst) = self.worst_abs_ofst {
            out.push_str(&format!("Worst absolute clock offset: {} ms\n", ofst));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parse_and_opposite() {
        assert_eq!("local".parse::<Side>().unwrap(), Side::Local);
        assert_eq!("remote".parse::<Side>().unwrap().opposite(), Side::Local);
        assert!("elsewhere".parse::<Side>().is_err());
    }

    #[test]
    fn test_role_parse_trims_output() {
        assert_eq!("receiver\n".parse::<Role>().unwrap(), Role::Receiver);
        assert_eq!(Role::Sender.opposite(), Role::Receiver);
        assert!("both".parse::<Role>().is_err());
    }

    #[test]
    fn test_record_offset_keeps_worst() {
        let mut result = ExperimentResult::default();
        result.record_offset(1.5);
        result.record_offset(0.2);
        assert_eq!(result.worst_abs_ofst, Some(1.5));
        result.record_offset(3.0);
        assert_eq!(result.worst_abs_ofst, Some(3.0));
    }

    #[test]
    fn test_summary_without_offset() {
        let result = ExperimentResult {
            test_start_time: Some("a".into()),
            test_end_time: Some("b".into()),
            ..Default::default()
        };
        assert_eq!(result.summary(), "Start at: a\nEnd at: b\n");
    }

    #[test]
    fn test_summary_with_offset() {
        let mut result = ExperimentResult::default();
        result.record_offset(2.25);
        assert!(result
            .summary()
            .ends_with("Worst absolute clock offset: 2.25 ms\n"));
    }
}
