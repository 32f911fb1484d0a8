//! Core trait definitions

mod manager;
mod runner;

pub use manager::ManagerLink;
pub use runner::{CommandRunner, ToolCommand};
