//! Tunnel identifier type

use std::fmt;

/// 1-based index of a tunnel inside a tunnel manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TunnelId(pub u32);

impl TunnelId {
    /// Create a new tunnel ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Tunnel ID for the flow at zero-based position `index`
    pub fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }

    /// Get the raw ID value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TunnelId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
