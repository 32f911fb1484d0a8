//! The two managers of an experiment

use pt_core::traits::ManagerLink;
use pt_core::{ExperimentError, ManagerKind};
use pt_protocol::ManagerCommand;

/// Tunnel server manager and tunnel client manager
pub struct ManagerPair<M> {
    pub server: M,
    pub client: M,
}

impl<M> ManagerPair<M> {
    pub fn new(server: M, client: M) -> Self {
        Self { server, client }
    }

    pub fn get(&self, kind: ManagerKind) -> &M {
        match kind {
            ManagerKind::TunnelServer => &self.server,
            ManagerKind::TunnelClient => &self.client,
        }
    }

    pub fn get_mut(&mut self, kind: ManagerKind) -> &mut M {
        match kind {
            ManagerKind::TunnelServer => &mut self.server,
            ManagerKind::TunnelClient => &mut self.client,
        }
    }
}

impl<M: ManagerLink> ManagerPair<M> {
    /// Send a command to one manager, tagging errors with the manager
    pub async fn send(
        &mut self,
        kind: ManagerKind,
        command: ManagerCommand,
    ) -> Result<(), ExperimentError> {
        self.get_mut(kind)
            .send(command)
            .await
            .map_err(ExperimentError::channel(kind))
    }

    /// Stop all flows and quit both managers
    pub async fn halt_all(&mut self) -> Result<(), ExperimentError> {
        self.send(ManagerKind::TunnelServer, ManagerCommand::Halt)
            .await?;
        self.send(ManagerKind::TunnelClient, ManagerCommand::Halt)
            .await
    }
}
