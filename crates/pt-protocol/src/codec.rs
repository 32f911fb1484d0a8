//! Tokio codec for manager command/response lines

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec};

use crate::command::ManagerCommand;
use crate::error::ProtocolError;

/// Upper bound on a single manager output line
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Codec writing [`ManagerCommand`]s and reading raw output lines
#[derive(Debug)]
pub struct ManagerCodec {
    lines: LinesCodec,
}

impl ManagerCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }
}

impl Default for ManagerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ManagerCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.lines.decode(src)?)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.lines.decode_eof(src)?)
    }
}

impl Encoder<ManagerCommand> for ManagerCodec {
    type Error = ProtocolError;

    fn encode(&mut self, command: ManagerCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = command.to_string();
        tracing::trace!(%line, "encoding manager command");
        Ok(self.lines.encode(line, dst)?)
    }
}
