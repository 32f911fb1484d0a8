//! Tunnel manager sessions

mod channel;
mod pair;
mod process;

pub use channel::ManagerChannel;
pub use pair::ManagerPair;
pub use process::{kill_process_group, ManagerProcess};
