//! pt-protocol: Line protocol for pantheon tunnel managers
//!
//! A tunnel manager is driven over its stdin/stdout with one command per
//! line. This crate defines the commands, the response formats the
//! orchestrator relies on, and the codec used to frame both directions.

pub mod codec;
pub mod command;
pub mod error;
pub mod response;
pub mod tunnel;

pub use codec::ManagerCodec;
pub use command::ManagerCommand;
pub use error::ProtocolError;
pub use response::{
    is_connected_line, is_ready_line, parse_port_line, TunnelServerResponse, CONNECTION_MARKER,
    PORT_PREFIX, READY_MARKER,
};
pub use tunnel::TunnelId;
