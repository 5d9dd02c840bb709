//! TCP Server
//!
//! Accepts connections and runs each one on its own worker thread.

use std::io::{BufWriter, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::manager::SegmentManager;
use crate::protocol::{write_response, Response};

use super::Connection;

/// How long the accept loop sleeps when no client is waiting
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// TCP server for SegKV
pub struct Server {
    config: Config,
    manager: Arc<SegmentManager>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listen address from `config`
    ///
    /// The listener is non-blocking so [`Server::run`] can notice shutdown.
    pub fn bind(config: Config, manager: Arc<SegmentManager>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;

        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            config,
            manager,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Flag that stops [`Server::run`] when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shut down gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Accept connections until shutdown is signalled (blocking)
    pub fn run(&self) -> Result<()> {
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    return Err(e.into());
                }
            }
        }

        tracing::info!("Server shutting down");
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Dropping connection from {}: {}", addr, e);
            return;
        }

        if self.active_connections.load(Ordering::SeqCst) >= self.config.max_connections {
            tracing::warn!("Rejecting {}: connection limit reached", addr);
            let mut writer = BufWriter::new(stream);
            let _ = write_response(&mut writer, &Response::error("server busy"));
            return;
        }

        let guard = ConnectionGuard::new(Arc::clone(&self.active_connections));
        let manager = Arc::clone(&self.manager);
        let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

        let spawned = thread::Builder::new()
            .name(format!("segkv-conn-{}", addr))
            .spawn(move || {
                let _guard = guard;
                let result = Connection::new(stream, manager).and_then(|mut conn| {
                    conn.set_timeouts(read_ms, write_ms)?;
                    conn.handle()
                });
                if let Err(e) = result {
                    tracing::debug!("Connection {} ended with error: {}", addr, e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn worker for {}: {}", addr, e);
        }
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}

/// Counts a live connection for as long as it is held
struct ConnectionGuard(Arc<AtomicUsize>);

impl ConnectionGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
