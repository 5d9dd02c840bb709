//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, SegKvError};
use crate::manager::SegmentManager;
use crate::protocol::{read_command, write_response, Command, Response};

/// Message sent to clients for storage failures; details stay in the log
pub const GENERIC_ERROR: &str = "internal storage error";

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Shared storage engine
    manager: Arc<SegmentManager>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O on two handles of the same stream
    pub fn new(stream: TcpStream, manager: Arc<SegmentManager>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            manager,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 means no timeout)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads commands in a loop and sends responses.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(SegKvError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} disconnected ({:?})", self.peer_addr, e.kind());
                    return Ok(());
                }
                Err(SegKvError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    let _ = write_response(&mut self.writer, &Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);

            let response = self.execute_command(command);

            if let Err(e) = write_response(&mut self.writer, &response) {
                if let SegKvError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) {
                        tracing::debug!(
                            "Client {} disconnected before response could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Execute a command against the manager and build the response
    fn execute_command(&self, command: Command) -> Response {
        match command {
            Command::Get { key } => match self.manager.read(&key) {
                Ok(Some(value)) => Response::value(&value),
                Ok(None) => Response::not_found(),
                Err(e) => self.failure(e),
            },
            Command::Put { key, value } => match self.manager.write(&key, &value) {
                Ok(()) => Response::ok(),
                Err(e) => self.failure(e),
            },
            Command::Ping => Response::value("PONG"),
        }
    }

    /// Map a storage error to a client response
    ///
    /// Input errors are echoed; anything else is logged and reported
    /// generically so paths and offsets never reach the client.
    fn failure(&self, e: SegKvError) -> Response {
        match e {
            SegKvError::InvalidKey(_) | SegKvError::ValueTooLarge { .. } => {
                Response::error(&e.to_string())
            }
            _ => {
                tracing::error!("Request from {} failed: {}", self.peer_addr, e);
                Response::error(GENERIC_ERROR)
            }
        }
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}
