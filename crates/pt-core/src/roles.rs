//! Role resolution for a flow
//!
//! Three inputs decide everything about who does what inside a tunnel:
//! which host runs the tunnel server, which host runs the sender, and
//! which role the scheme wants started first. The resolver is pure; it
//! never touches a manager.

use std::path::{Path, PathBuf};

use crate::flow::FlowLogs;
use crate::types::{Link, ManagerKind, Role, Side};

/// Ingress/egress log pair written by one tunnel endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointLogs {
    pub ingress: PathBuf,
    pub egress: PathBuf,
}

impl EndpointLogs {
    /// `--ingress-log=… --egress-log=…` arguments
    pub fn as_args(&self) -> String {
        format!(
            "--ingress-log={} --egress-log={}",
            self.ingress.display(),
            self.egress.display()
        )
    }
}

/// One scheme instance to launch inside a tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLaunch {
    pub role: Role,
    pub src: PathBuf,
    pub manager: ManagerKind,
}

impl ProgramLaunch {
    /// Invocation run by the manager; `peer` is the address to connect to
    pub fn invocation(&self, python: &str, peer: Option<(&str, u16)>) -> String {
        let mut cmd = format!("{} {} {}", python, self.src.display(), self.role);
        if let Some((ip, port)) = peer {
            cmd.push_str(&format!(" {} {}", ip, port));
        }
        cmd
    }
}

/// Private tunnel addresses reported by the tunnel server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateIps {
    pub client: String,
    pub server: String,
}

/// Fully resolved roles of one flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Started first; listens and announces its port
    pub first: ProgramLaunch,
    /// Started by the scheduler, pointed at the first program
    pub second: ProgramLaunch,
    /// Private address of the first program's tunnel endpoint
    pub first_ip: String,
}

/// Pure mapping from experiment topology to per-flow roles
#[derive(Debug, Clone)]
pub struct RoleResolver {
    run_first: Role,
    server_side: Side,
    sender_side: Side,
    local_src: PathBuf,
    remote_src: Option<PathBuf>,
}

impl RoleResolver {
    pub fn new(
        run_first: Role,
        server_side: Side,
        sender_side: Side,
        local_src: impl Into<PathBuf>,
        remote_src: Option<PathBuf>,
    ) -> Self {
        Self {
            run_first,
            server_side,
            sender_side,
            local_src: local_src.into(),
            remote_src,
        }
    }

    pub fn run_first(&self) -> Role {
        self.run_first
    }

    pub fn server_side(&self) -> Side {
        self.server_side
    }

    fn same_side(&self) -> bool {
        self.sender_side == self.server_side
    }

    /// Host a manager's tunnel endpoints live on
    pub fn side_of(&self, manager: ManagerKind) -> Side {
        match manager {
            ManagerKind::TunnelServer => self.server_side,
            ManagerKind::TunnelClient => self.server_side.opposite(),
        }
    }

    /// Host a role's program runs on
    pub fn role_side(&self, role: Role) -> Side {
        match role {
            Role::Sender => self.sender_side,
            Role::Receiver => self.sender_side.opposite(),
        }
    }

    /// Manager responsible for launching a role
    pub fn manager_for(&self, role: Role) -> ManagerKind {
        let sender_manager = if self.same_side() {
            ManagerKind::TunnelServer
        } else {
            ManagerKind::TunnelClient
        };
        match role {
            Role::Sender => sender_manager,
            Role::Receiver => sender_manager.other(),
        }
    }

    /// Scheme source path used on the host running `role`
    pub fn src_for(&self, role: Role) -> &Path {
        match (self.role_side(role), &self.remote_src) {
            (Side::Remote, Some(remote)) => remote,
            _ => &self.local_src,
        }
    }

    /// Which raw logs a tunnel endpoint records
    ///
    /// Fixed by whether the endpoint sits next to the sender, not by which
    /// host it is on.
    pub fn endpoint_logs(&self, manager: ManagerKind, logs: &FlowLogs) -> EndpointLogs {
        let next_to_sender = (manager == ManagerKind::TunnelServer) == self.same_side();
        let (ingress, egress) = if next_to_sender {
            (Link::Acklink, Link::Datalink)
        } else {
            (Link::Datalink, Link::Acklink)
        };
        EndpointLogs {
            ingress: logs.ingress(ingress).to_path_buf(),
            egress: logs.egress(egress).to_path_buf(),
        }
    }

    /// Logs written on the remote host, to be fetched before merging
    pub fn remote_logs(&self, logs: &FlowLogs) -> EndpointLogs {
        let remote_endpoint = if self.server_side == Side::Remote {
            ManagerKind::TunnelServer
        } else {
            ManagerKind::TunnelClient
        };
        self.endpoint_logs(remote_endpoint, logs)
    }

    /// Resolve both launches once the tunnel's private addresses are known
    pub fn resolve(&self, ips: &PrivateIps) -> RoleAssignment {
        let first_role = self.run_first;
        let second_role = first_role.opposite();

        let launch = |role: Role| ProgramLaunch {
            role,
            src: self.src_for(role).to_path_buf(),
            manager: self.manager_for(role),
        };
        let first = launch(first_role);
        let second = launch(second_role);

        let first_ip = match first.manager {
            ManagerKind::TunnelServer => ips.server.clone(),
            ManagerKind::TunnelClient => ips.client.clone(),
        };

        RoleAssignment {
            first,
            second,
            first_ip,
        }
    }
}
