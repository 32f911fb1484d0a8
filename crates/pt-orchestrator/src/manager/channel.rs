//! Line channel over a manager's stdin/stdout

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

use pt_core::traits::ManagerLink;
use pt_core::ChannelError;
use pt_protocol::{ManagerCodec, ManagerCommand};

/// Framed command/response channel to one tunnel manager
///
/// Bytes of a line that is still incomplete when a read times out stay
/// buffered for the next read; the timed-out call returns nothing.
pub struct ManagerChannel<R, W> {
    label: String,
    reader: FramedRead<R, ManagerCodec>,
    writer: FramedWrite<W, ManagerCodec>,
}

impl<R, W> ManagerChannel<R, W>
where
    R: AsyncRead,
    W: AsyncWrite,
{
    /// Wrap a manager's output (`reader`) and input (`writer`)
    pub fn new(label: impl Into<String>, reader: R, writer: W) -> Self {
        Self {
            label: label.into(),
            reader: FramedRead::new(reader, ManagerCodec::new()),
            writer: FramedWrite::new(writer, ManagerCodec::new()),
        }
    }
}

#[async_trait]
impl<R, W> ManagerLink for ManagerChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn label(&self) -> &str {
        &self.label
    }

    async fn send(&mut self, command: ManagerCommand) -> Result<(), ChannelError> {
        tracing::debug!(manager = %self.label, %command, "-> manager");
        self.writer.send(command).await?;
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, ChannelError> {
        match tokio::time::timeout(timeout, self.reader.next()).await {
            Err(_) => Err(ChannelError::Timeout(timeout)),
            Ok(None) => Err(ChannelError::Closed),
            Ok(Some(line)) => {
                let line = line?;
                tracing::debug!(manager = %self.label, %line, "<- manager");
                Ok(line)
            }
        }
    }
}
