//! Where each tunnel endpoint lives and how it is addressed

use pt_core::config::{ExperimentConfig, RemoteHost};
use pt_core::{ManagerKind, Role, RoleResolver, Side};

/// Address tunnel clients use when no host address is configured
pub const MAHIMAHI_BASE: &str = "$MAHIMAHI_BASE";

/// Static layout shared by every flow of an experiment
#[derive(Debug, Clone)]
pub struct TunnelTopology {
    pub resolver: RoleResolver,
    /// Externally reachable address of the tunnel server
    pub server_addr: String,
    pub local_if: Option<String>,
    pub remote_if: Option<String>,
}

impl TunnelTopology {
    /// Derive the topology of a run from its configuration
    pub fn from_config(
        config: &ExperimentConfig,
        run_first: Role,
        remote: Option<&RemoteHost>,
    ) -> Self {
        let server_addr = match config.server_side {
            Side::Remote => remote.map(|r| r.ip.clone()),
            Side::Local => config.local_addr.clone(),
        }
        .unwrap_or_else(|| MAHIMAHI_BASE.to_string());

        let resolver = RoleResolver::new(
            run_first,
            config.server_side,
            config.sender_side,
            config.src_path(),
            remote.map(|r| r.cc_src(&config.cc)),
        );

        Self {
            resolver,
            server_addr,
            local_if: config.local_if.clone(),
            remote_if: config.remote_if.clone(),
        }
    }

    /// Interface override for the endpoint a manager hosts
    pub fn interface_for(&self, manager: ManagerKind) -> Option<&str> {
        match self.resolver.side_of(manager) {
            Side::Local => self.local_if.as_deref(),
            Side::Remote => self.remote_if.as_deref(),
        }
    }
}
