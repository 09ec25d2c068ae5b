//! Bidirectional message channels between a worker and its parent.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::{decode_line, encode_line, ProtocolError, WorkerMessage};

/// One end of a worker protocol connection.
#[async_trait]
pub trait WorkerChannel: Send {
    /// Sends one message to the peer.
    async fn send(&mut self, message: WorkerMessage) -> Result<(), ProtocolError>;

    /// Receives the next message. `Ok(None)` once the peer has hung up.
    async fn recv(&mut self) -> Result<Option<WorkerMessage>, ProtocolError>;
}

/// Newline-delimited JSON over a byte stream pair (stdio of a child).
pub struct LineChannel<R, W> {
    lines: Lines<BufReader<R>>,
    writer: W,
}

impl<R, W> LineChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }
}

#[async_trait]
impl<R, W> WorkerChannel for LineChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: WorkerMessage) -> Result<(), ProtocolError> {
        let line = encode_line(&message)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<WorkerMessage>, ProtocolError> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(&line) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => warn!("Ignoring unparsable worker line {:?}: {}", line, e),
            }
        }
        Ok(None)
    }
}

/// In-memory channel end, used to run a worker inside the current process.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<WorkerMessage>,
    rx: mpsc::UnboundedReceiver<WorkerMessage>,
}

/// Two connected in-memory ends: `(parent, worker)`.
pub fn memory_pair() -> (MemoryChannel, MemoryChannel) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        MemoryChannel { tx: a_tx, rx: b_rx },
        MemoryChannel { tx: b_tx, rx: a_rx },
    )
}

#[async_trait]
impl WorkerChannel for MemoryChannel {
    async fn send(&mut self, message: WorkerMessage) -> Result<(), ProtocolError> {
        self.tx.send(message).map_err(|_| ProtocolError::Closed)
    }

    async fn recv(&mut self) -> Result<Option<WorkerMessage>, ProtocolError> {
        Ok(self.rx.recv().await)
    }
}
