//! First-stage launches for every flow

use std::time::Duration;

use pt_core::config::ExperimentConfig;
use pt_core::traits::ManagerLink;
use pt_core::{ExperimentError, Flow, ManagerKind};
use pt_protocol::{ManagerCommand, TunnelId};

use crate::handshake::{HandshakeParams, TunnelHandshake};
use crate::manager::ManagerPair;
use crate::topology::TunnelTopology;

/// A second-stage program, ready to be issued by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLaunch {
    pub tunnel: TunnelId,
    pub manager: ManagerKind,
    pub command: ManagerCommand,
}

/// Brings up tunnels and first-stage programs, one flow at a time
pub struct FlowOrchestrator {
    topology: TunnelTopology,
    handshake: HandshakeParams,
    port_wait: Duration,
    python: String,
}

impl FlowOrchestrator {
    pub fn new(
        topology: TunnelTopology,
        handshake: HandshakeParams,
        port_wait: Duration,
        python: impl Into<String>,
    ) -> Self {
        Self {
            topology,
            handshake,
            port_wait,
            python: python.into(),
        }
    }

    pub fn from_config(config: &ExperimentConfig, topology: TunnelTopology) -> Self {
        Self::new(
            topology,
            HandshakeParams::from_config(config),
            config.timeouts.port,
            config.python.clone(),
        )
    }

    pub fn topology(&self) -> &TunnelTopology {
        &self.topology
    }

    /// Start every flow in order and return the queued second stages
    pub async fn run_flows<M: ManagerLink>(
        &self,
        managers: &mut ManagerPair<M>,
        flows: &[Flow],
    ) -> Result<Vec<QueuedLaunch>, ExperimentError> {
        let mut queued = Vec::with_capacity(flows.len());
        for flow in flows {
            queued.push(self.start_flow(managers, flow).await?);
        }
        Ok(queued)
    }

    /// Handshake, launch the first program and learn its port
    pub async fn start_flow<M: ManagerLink>(
        &self,
        managers: &mut ManagerPair<M>,
        flow: &Flow,
    ) -> Result<QueuedLaunch, ExperimentError> {
        let tunnel = flow.tunnel;

        let connected = TunnelHandshake::new(flow, &self.topology, self.handshake)
            .run(managers)
            .await?;
        let roles = self.topology.resolver.resolve(&connected.ips);

        tracing::info!(
            "Tunnel {}: running {} first on the {}",
            tunnel,
            roles.first.role,
            roles.first.manager
        );
        let first = roles.first.invocation(&self.python, None);
        managers
            .send(roles.first.manager, ManagerCommand::tunnel(tunnel, first))
            .await?;

        let port = managers
            .get_mut(roles.first.manager)
            .read_port(tunnel, self.port_wait)
            .await
            .map_err(ExperimentError::channel(roles.first.manager))?;
        tracing::info!("Tunnel {}: {} listening on port {}", tunnel, roles.first.role, port);

        let second = roles
            .second
            .invocation(&self.python, Some((roles.first_ip.as_str(), port)));
        Ok(QueuedLaunch {
            tunnel,
            manager: roles.second.manager,
            command: ManagerCommand::tunnel(tunnel, second),
        })
    }
}
