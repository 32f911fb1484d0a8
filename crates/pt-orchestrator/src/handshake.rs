//! Per-flow tunnel establishment
//!
//! A tunnel is up once the tunnel client manager reports `got connection`.
//! Until then the client is relaunched, up to a fixed number of times.

use std::fmt;
use std::time::Duration;

use pt_core::config::ExperimentConfig;
use pt_core::roles::PrivateIps;
use pt_core::traits::ManagerLink;
use pt_core::{ChannelError, ExperimentError, Flow, ManagerKind};
use pt_protocol::{is_connected_line, ManagerCommand, TunnelServerResponse};

use crate::manager::ManagerPair;
use crate::topology::TunnelTopology;

/// Progress of one tunnel's handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    ServerRequested,
    ServerIpsKnown,
    ClientRequested,
    Connected,
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Idle => "idle",
            HandshakeState::ServerRequested => "server requested",
            HandshakeState::ServerIpsKnown => "server ips known",
            HandshakeState::ClientRequested => "client requested",
            HandshakeState::Connected => "connected",
            HandshakeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Timeouts and retry budget of a handshake
#[derive(Debug, Clone, Copy)]
pub struct HandshakeParams {
    pub server_response_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_attempts: u32,
}

impl HandshakeParams {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            server_response_timeout: config.timeouts.server_response,
            connect_timeout: config.timeouts.connect,
            max_attempts: config.handshake.max_attempts,
        }
    }
}

impl Default for HandshakeParams {
    fn default() -> Self {
        Self::from_config(&ExperimentConfig::default())
    }
}

/// A tunnel whose client has connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedTunnel {
    pub ips: PrivateIps,
    /// Client launches it took
    pub attempts: u32,
}

/// Brings up the tunnel of one flow
pub struct TunnelHandshake<'a> {
    flow: &'a Flow,
    topology: &'a TunnelTopology,
    params: HandshakeParams,
    state: HandshakeState,
}

impl<'a> TunnelHandshake<'a> {
    pub fn new(flow: &'a Flow, topology: &'a TunnelTopology, params: HandshakeParams) -> Self {
        Self {
            flow,
            topology,
            params,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    fn transition(&mut self, next: HandshakeState) {
        tracing::debug!(tunnel = %self.flow.tunnel, "handshake {} -> {}", self.state, next);
        self.state = next;
    }

    fn with_interface(&self, manager: ManagerKind, mut cmd: String) -> String {
        if let Some(iface) = self.topology.interface_for(manager) {
            cmd.push_str(&format!(" --interface={}", iface));
        }
        cmd
    }

    /// `mm-tunnelserver` invocation for this flow
    pub fn server_command(&self) -> String {
        let logs = self
            .topology
            .resolver
            .endpoint_logs(ManagerKind::TunnelServer, &self.flow.logs);
        self.with_interface(
            ManagerKind::TunnelServer,
            format!("mm-tunnelserver {}", logs.as_args()),
        )
    }

    /// Tunnel client invocation built from the server's response
    pub fn client_command(&self, response: &TunnelServerResponse) -> String {
        let logs = self
            .topology
            .resolver
            .endpoint_logs(ManagerKind::TunnelClient, &self.flow.logs);
        self.with_interface(
            ManagerKind::TunnelClient,
            format!(
                "{} {}",
                response.client_invocation(&self.topology.server_addr),
                logs.as_args()
            ),
        )
    }

    /// Run the handshake to completion
    pub async fn run<M: ManagerLink>(
        &mut self,
        managers: &mut ManagerPair<M>,
    ) -> Result<ConnectedTunnel, ExperimentError> {
        let result = self.establish(managers).await;
        if result.is_err() {
            self.transition(HandshakeState::Failed);
        }
        result
    }

    async fn establish<M: ManagerLink>(
        &mut self,
        managers: &mut ManagerPair<M>,
    ) -> Result<ConnectedTunnel, ExperimentError> {
        let tunnel = self.flow.tunnel;
        let server = ManagerKind::TunnelServer;
        let client = ManagerKind::TunnelClient;

        managers
            .send(server, ManagerCommand::tunnel(tunnel, self.server_command()))
            .await?;
        managers.send(server, ManagerCommand::ReadLine(tunnel)).await?;
        self.transition(HandshakeState::ServerRequested);

        let line = managers
            .get_mut(server)
            .read_line(self.params.server_response_timeout)
            .await
            .map_err(ExperimentError::channel(server))?;
        let response = TunnelServerResponse::parse(&line)?;
        let ips = PrivateIps {
            client: response.client_private_ip().to_string(),
            server: response.server_private_ip().to_string(),
        };
        self.transition(HandshakeState::ServerIpsKnown);

        let client_cmd = self.client_command(&response);
        let max_attempts = self.params.max_attempts;

        for attempt in 1..=max_attempts {
            managers
                .send(client, ManagerCommand::tunnel(tunnel, client_cmd.clone()))
                .await?;
            self.transition(HandshakeState::ClientRequested);

            if self.await_connection(managers).await? {
                self.transition(HandshakeState::Connected);
                tracing::info!("Tunnel {} is connected", tunnel);
                return Ok(ConnectedTunnel {
                    ips,
                    attempts: attempt,
                });
            }

            tracing::warn!(
                "Tunnel {} connection timeout (attempt {}/{})",
                tunnel,
                attempt,
                max_attempts
            );
        }

        Err(ExperimentError::HandshakeExhausted {
            tunnel,
            attempts: max_attempts,
        })
    }

    /// Poll the client manager until it connects or one read times out
    ///
    /// Every `readline` gets its own `connect_timeout`; output other than
    /// the connection marker is skipped and the read repeats.
    async fn await_connection<M: ManagerLink>(
        &self,
        managers: &mut ManagerPair<M>,
    ) -> Result<bool, ExperimentError> {
        let client = ManagerKind::TunnelClient;

        loop {
            managers
                .send(client, ManagerCommand::ReadLine(self.flow.tunnel))
                .await?;
            match managers
                .get_mut(client)
                .read_line(self.params.connect_timeout)
                .await
            {
                Ok(line) if is_connected_line(&line) => return Ok(true),
                Ok(line) => {
                    tracing::debug!(tunnel = %self.flow.tunnel, %line, "waiting for connection")
                }
                Err(ChannelError::Timeout(_)) => return Ok(false),
                Err(e) => return Err(ExperimentError::channel(client)(e)),
            }
        }
    }
}
