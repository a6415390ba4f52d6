//! Connection Handler Module
//!
//! Each client gets its own handler task that runs a loop: read bytes,
//! decode one request frame, execute it, send back exactly one response
//! frame.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. Handler task spawned with a fresh Session
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  Read bytes from socket      │
//!    │  Parse one request frame     │
//!    │  Execute the command         │
//!    │  Send the response           │
//!    │         [loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects → stream closed, session discarded
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream: a read may deliver a partial frame or several frames
//! at once. Incoming data accumulates in a `BytesMut` buffer and the
//! parser drains complete frames from the front.
//!
//! ## Error Surfacing
//!
//! Command failures are already `Error` values and simply get encoded.
//! Malformed frames answer with `bad request` (unknown tag) or
//! `invalid protocol` (anything else), then the buffer skips to the next
//! CRLF and the connection stays open. Only I/O failures and
//! end-of-stream end the loop.

use crate::commands::{CommandHandler, Session};
use crate::protocol::{FrameParser, ParseError, Value};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Maximum size for the read buffer (64 KB)
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
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
}

/// Handles a single client connection.
///
/// Owns the session state for this connection: the stream, the read
/// buffer, and the authenticated/current-database flags commands act on.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// The command handler (shared server state)
    command_handler: CommandHandler,

    /// Frame parser
    parser: FrameParser,

    /// Per-connection session state
    session: Session,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler with a fresh, unauthenticated
    /// session pointed at database 0.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: FrameParser::new(),
            session: Session::new(),
            stats,
        }
    }

    /// Runs the connection loop until the client disconnects or an I/O
    /// error occurs. The stream is closed when this returns.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Drain every complete request currently buffered
            loop {
                match self.try_parse_request() {
                    Ok(Some(request)) => {
                        let response = self.command_handler.execute(request, &mut self.session);
                        self.stats.command_processed();
                        self.send_response(&response).await?;
                    }
                    Ok(None) => break, // Incomplete, read more
                    Err(e) => {
                        // Protocol error: report it, resync, keep going
                        warn!(client = %self.addr, error = %e, "Protocol error");
                        let response = Value::error(protocol_error_message(&e));
                        self.send_response(&response).await?;
                        self.resync_buffer();
                    }
                }
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to parse one request from the buffer.
    fn try_parse_request(&mut self) -> Result<Option<Value>, ParseError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer)? {
            Some((value, consumed)) => {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed request"
                );
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Discards buffered bytes through the next line terminator.
    ///
    /// After a malformed frame the buffer position is unreliable;
    /// skipping the offending line lets the next frame start clean.
    fn resync_buffer(&mut self) {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => self.buffer.advance(pos + 1),
            None => self.buffer.clear(),
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            warn!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // End of stream: clean when nothing was pending
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Sends a response to the client.
    async fn send_response(&mut self, response: &Value) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Maps a parse error to the message the client sees.
fn protocol_error_message(error: &ParseError) -> &'static str {
    match error {
        ParseError::UnknownTag(_) => "bad request",
        _ => "invalid protocol",
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// End of stream with a partial frame still buffered
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection to completion.
///
/// Convenience wrapper over [`ConnectionHandler`] for spawning.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
