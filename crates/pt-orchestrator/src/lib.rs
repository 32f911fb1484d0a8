//! pt-orchestrator: Multi-flow tunnel experiment driver
//!
//! Starts the tunnel server and tunnel client managers, opens one tunnel
//! per flow, launches the scheme pair in each tunnel on a fixed schedule,
//! and merges the per-tunnel packet logs once the run is over.

pub mod clock;
pub mod experiment;
pub mod flows;
pub mod handshake;
pub mod manager;
pub mod merge;
pub mod runner;
pub mod scheduler;
pub mod topology;

pub use experiment::Experiment;
pub use flows::{FlowOrchestrator, QueuedLaunch};
pub use handshake::{ConnectedTunnel, HandshakeParams, HandshakeState, TunnelHandshake};
pub use manager::{ManagerChannel, ManagerPair, ManagerProcess};
pub use merge::LogMerger;
pub use runner::SystemRunner;
pub use scheduler::{ScheduleParams, TimingScheduler};
pub use topology::TunnelTopology;
