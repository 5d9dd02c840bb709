//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single non-blocking acceptor loop
//! - One worker thread per connection, bounded by `max_connections`
//! - Commands go straight to the shared `SegmentManager`

mod server;
mod connection;

pub use server::Server;
pub use connection::{Connection, GENERIC_ERROR};
