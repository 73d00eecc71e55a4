//! Connection Handler
//!
//! Each client gets its own task running a read-decode-dispatch-reply loop.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, ConnectionHandler spawned
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │  Decode one RESP value       │◄─┐
//!    │  Non-empty array? dispatch   │  │
//!    │  Anything else?   ignore     │  │
//!    │  Write + flush the reply     │──┘
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. Peer closes between messages  -> graceful end
//!    Framing error / truncated     -> logged, connection dropped, no reply
//!    Reply cannot be encoded       -> logged, connection dropped
//! ```
//!
//! A slow client only stalls its own task.

use crate::commands::{command_args, CommandHandler};
use crate::protocol::{write_value, DecodeError, EncodeError, RespReader};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tracing::{debug, info, trace, warn};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Broken framing, truncated stream or read failure
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The reply could not be encoded or written
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

impl ConnectionError {
    /// True when the peer simply went away.
    pub fn is_disconnect(&self) -> bool {
        let io_err = match self {
            ConnectionError::Decode(DecodeError::Io(e)) | ConnectionError::Encode(EncodeError::Io(e)) => e,
            _ => return false,
        };
        matches!(
            io_err.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::ConnectionAborted
        )
    }
}

/// Drives one client connection.
pub struct ConnectionHandler<S> {
    reader: RespReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,

    /// Client's address (for logging)
    addr: SocketAddr,

    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Creates a handler with the default frame size cap.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self::with_max_frame_bytes(
            stream,
            addr,
            command_handler,
            stats,
            crate::protocol::stream::DEFAULT_MAX_FRAME_BYTES,
        )
    }

    pub fn with_max_frame_bytes(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        max_frame_bytes: usize,
    ) -> Self {
        stats.connection_opened();

        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: RespReader::with_max_frame_bytes(read_half, max_frame_bytes),
            writer: BufWriter::new(write_half),
            addr,
            command_handler,
            stats,
        }
    }

    /// Runs the loop until the peer disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(e) if e.is_disconnect() => {
                debug!(client = %self.addr, error = %e, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Closing connection"),
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let Some((frame, read)) = self.reader.read_value_counted().await? else {
                return Ok(());
            };
            self.stats.bytes_read(read);

            let args = match command_args(frame) {
                Ok(Some(args)) => args,
                Ok(None) => {
                    debug!(client = %self.addr, "Ignoring message that is not a command array");
                    continue;
                }
                Err(e) => {
                    let written = write_value(&mut self.writer, &e.to_reply()).await?;
                    self.writer.flush().await.map_err(EncodeError::from)?;
                    self.stats.bytes_written(written);
                    continue;
                }
            };

            trace!(client = %self.addr, command = %args[0], argc = args.len() - 1, "Dispatching");

            self.stats.command_processed();
            let written = self
                .command_handler
                .dispatch(&mut self.writer, &args)
                .await?;
            self.stats.bytes_written(written);
        }
    }
}

/// Creates a [`ConnectionHandler`] and runs it to completion.
///
/// Errors are already logged by the handler.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    max_frame_bytes: usize,
) where
    S: AsyncRead + AsyncWrite,
{
    let handler =
        ConnectionHandler::with_max_frame_bytes(stream, addr, command_handler, stats, max_frame_bytes);
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ParseError;
    use crate::storage::KeyValueStore;
    use tokio_test::io::Builder;

    fn client_addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn handler_for<S: AsyncRead + AsyncWrite>(
        stream: S,
    ) -> (ConnectionHandler<S>, Arc<KeyValueStore>, Arc<ConnectionStats>) {
        let store = Arc::new(KeyValueStore::new());
        let stats = Arc::new(ConnectionStats::new());
        let handler = ConnectionHandler::new(
            stream,
            client_addr(),
            CommandHandler::new(Arc::clone(&store)),
            Arc::clone(&stats),
        );
        (handler, store, stats)
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();
        let (handler, _, _) = handler_for(mock);
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_command_surface_on_the_wire() {
        let mock = Builder::new()
            .read(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n")
            .write(b"+OK\r\n")
            .read(b"*3\r\n$6\r\nEXPIRE\r\n$3\r\nfoo\r\n$3\r\n100\r\n")
            .write(b":1\r\n")
            .read(b"*2\r\n$3\r\nTTL\r\n$3\r\nfoo\r\n")
            .write(b":100\r\n")
            .read(b"*2\r\n$7\r\nPERSIST\r\n$3\r\nfoo\r\n")
            .write(b":1\r\n")
            .read(b"*2\r\n$6\r\nEXISTS\r\n$3\r\nfoo\r\n")
            .write(b":1\r\n")
            .read(b"*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n")
            .write(b"$2\r\nhi\r\n")
            .read(b"*2\r\n$3\r\nDEL\r\n$3\r\nfoo\r\n")
            .write(b":1\r\n")
            .read(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
            .write(b"$-1\r\n")
            .build();
        let (handler, store, _) = handler_for(mock);
        handler.run().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection_open() {
        let mock = Builder::new()
            .read(b"*1\r\n$5\r\nHELLO\r\n")
            .write(b"-ERR unknown command 'HELLO'\r\n")
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();
        let (handler, _, _) = handler_for(mock);
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_command_messages_get_no_reply() {
        let mock = Builder::new()
            .read(b"+hello\r\n*0\r\n:5\r\n*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();
        let (handler, _, stats) = handler_for(mock);
        handler.run().await.unwrap();
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_invalid_command_element_gets_error_reply() {
        let mock = Builder::new()
            .read(b"*2\r\n$3\r\nGET\r\n*0\r\n")
            .write(b"-ERR invalid command format\r\n")
            .build();
        let (handler, _, _) = handler_for(mock);
        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_protocol_error_closes_without_reply() {
        let mock = Builder::new().read(b"!oops\r\n").build();
        let (handler, _, stats) = handler_for(mock);

        let err = handler.run().await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Decode(DecodeError::Parse(ParseError::UnknownPrefix(b'!')))
        ));
        assert!(!err.is_disconnect());
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_truncated_message_closes_without_reply() {
        let mock = Builder::new().read(b"*2\r\n$3\r\nGET\r\n$3\r\nfo").build();
        let (handler, _, _) = handler_for(mock);

        let err = handler.run().await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::Decode(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[tokio::test]
    async fn test_stats_are_tracked() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();
        let (handler, _, stats) = handler_for(mock);

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        handler.run().await.unwrap();

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 14);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn test_reset_counts_as_disconnect() {
        let err = ConnectionError::Decode(DecodeError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        )));
        assert!(err.is_disconnect());
    }
}
