//! Commands accepted by a tunnel manager
//!
//! Every command is a single line. The manager processes commands in the
//! order they arrive on its stdin.

use std::fmt;

use crate::tunnel::TunnelId;

/// A command line sent to a tunnel manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCommand {
    /// Label subsequent manager output (cosmetic)
    Prompt(String),

    /// Run an invocation inside tunnel `id` (create the tunnel or launch a program in it)
    Tunnel { id: TunnelId, invocation: String },

    /// Ask the manager to echo the next output line of tunnel `id`
    ReadLine(TunnelId),

    /// Terminate the manager and all of its tunnels
    Halt,
}

impl ManagerCommand {
    /// Convenience constructor for [`ManagerCommand::Tunnel`]
    pub fn tunnel(id: TunnelId, invocation: impl Into<String>) -> Self {
        Self::Tunnel {
            id,
            invocation: invocation.into(),
        }
    }

    /// Tunnel this command addresses, if any
    pub fn tunnel_id(&self) -> Option<TunnelId> {
        match self {
            Self::Tunnel { id, .. } | Self::ReadLine(id) => Some(*id),
            Self::Prompt(_) | Self::Halt => None,
        }
    }
}

impl fmt::Display for ManagerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt(label) => write!(f, "prompt {}", label),
            Self::Tunnel { id, invocation } => write!(f, "tunnel {} {}", id, invocation),
            Self::ReadLine(id) => write!(f, "tunnel {} readline", id),
            Self::Halt => f.write_str("halt"),
        }
    }
}
