//! pt-core: Core abstractions and configuration for pantheon tunnel experiments
//!
//! This crate provides the shared domain types, role resolution, error
//! taxonomy, configuration structures and the traits the orchestrator is
//! written against.

pub mod config;
pub mod error;
pub mod flow;
pub mod retry;
pub mod roles;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{ChannelError, ConfigError, ExperimentError};
pub use flow::{Flow, FlowLogs, LogNames};
pub use roles::{EndpointLogs, ProgramLaunch, RoleAssignment, RoleResolver};
pub use types::{ExperimentResult, Link, ManagerKind, Role, Side};
