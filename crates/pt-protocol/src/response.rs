//! Response formats produced by tunnel managers and launched programs
//!
//! The marker strings are a compatibility contract with the external
//! tunnel manager, tunnel client and scheme wrappers.

use crate::error::ProtocolError;

/// Printed exactly once by a manager when it accepts commands
pub const READY_MARKER: &str = "tunnel manager is running";

/// Contained in a tunnel client's output once the tunnel is up
pub const CONNECTION_MARKER: &str = "got connection";

/// Prefix of the line a scheme prints when its listening socket is open
pub const PORT_PREFIX: &str = "Listening on port";

/// Minimum number of tokens in a tunnel server response
const SERVER_RESPONSE_MIN_TOKENS: usize = 5;

/// Token carrying the placeholder for the server's reachable address
const SERVER_ADDR_TOKEN: usize = 1;

/// Token carrying the tunnel client's private address
const CLIENT_PRIVATE_IP_TOKEN: usize = 3;

/// Token carrying the tunnel server's private address
const SERVER_PRIVATE_IP_TOKEN: usize = 4;

/// Whether a manager output line announces readiness
pub fn is_ready_line(line: &str) -> bool {
    line.contains(READY_MARKER)
}

/// Whether a tunnel client output line reports an established tunnel
pub fn is_connected_line(line: &str) -> bool {
    line.contains(CONNECTION_MARKER)
}

/// Parse a `Listening on port: <N>` announcement
///
/// Returns `Ok(None)` for any other line so callers can skip noise.
pub fn parse_port_line(line: &str) -> Result<Option<u16>, ProtocolError> {
    let Some((prefix, port)) = line.split_once(": ") else {
        return Ok(None);
    };
    if prefix != PORT_PREFIX {
        return Ok(None);
    }

    let port = port.trim();
    port.parse::<u16>()
        .map(Some)
        .map_err(|_| ProtocolError::InvalidPort(port.to_string()))
}

/// The line a tunnel server prints describing how to start its client
///
/// The line is itself a tunnel client invocation, e.g.
/// `mm-tunnelclient localhost 42315 100.64.0.4 100.64.0.3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelServerResponse {
    tokens: Vec<String>,
}

impl TunnelServerResponse {
    /// Parse a raw response line
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let tokens: Vec<String> = line.split_whitespace().map(String::from).collect();
        if tokens.len() < SERVER_RESPONSE_MIN_TOKENS {
            return Err(ProtocolError::MalformedServerResponse {
                line: line.trim_end().to_string(),
                found: tokens.len(),
                expected: SERVER_RESPONSE_MIN_TOKENS,
            });
        }
        Ok(Self { tokens })
    }

    /// Private address of the tunnel client side
    pub fn client_private_ip(&self) -> &str {
        &self.tokens[CLIENT_PRIVATE_IP_TOKEN]
    }

    /// Private address of the tunnel server side
    pub fn server_private_ip(&self) -> &str {
        &self.tokens[SERVER_PRIVATE_IP_TOKEN]
    }

    /// Client invocation with the address placeholder replaced by `server_addr`
    pub fn client_invocation(&self, server_addr: &str) -> String {
        let mut tokens = self.tokens.clone();
        tokens[SERVER_ADDR_TOKEN] = server_addr.to_string();
        tokens.join(" ")
    }
}
