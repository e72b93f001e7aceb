//! Connection context
//!
//! Context passed to request handling, identifying the connection in logs.

use std::net::SocketAddr;
use std::time::Instant;

/// Per-connection information
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique connection ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// When the connection was accepted
    pub connected_at: Instant,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            session_id,
            peer_addr,
            connected_at: Instant::now(),
        }
    }

    /// Time since the connection was accepted
    pub fn elapsed(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
