//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or parsing manager traffic
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Tunnel server response did not have the expected token layout
    #[error("Malformed tunnel server response ({found} tokens, need at least {expected}): {line:?}")]
    MalformedServerResponse {
        line: String,
        found: usize,
        expected: usize,
    },

    /// Port announcement carried something that is not a port number
    #[error("Invalid port in announcement: {0:?}")]
    InvalidPort(String),

    /// A single line exceeded the codec limit
    #[error("Line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_util::codec::LinesCodecError> for ProtocolError {
    fn from(err: tokio_util::codec::LinesCodecError) -> Self {
        match err {
            tokio_util::codec::LinesCodecError::MaxLineLengthExceeded => ProtocolError::LineTooLong {
                max: crate::codec::MAX_LINE_LENGTH,
            },
            tokio_util::codec::LinesCodecError::Io(e) => ProtocolError::Io(e),
        }
    }
}
