//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::session::{SessionKeys, DEFAULT_NICK_TTL};

/// Default listening port
pub const DEFAULT_PORT: u16 = 1337;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Time allowed from accept until the response starts; a client that
    /// has not sent its request by then is dropped
    pub request_timeout: Duration,

    /// Maximum request body size in bytes
    pub max_request_size: usize,

    /// How long a registered nickname stays reserved
    pub nick_ttl: Duration,

    /// How often expired nicknames are purged
    pub nick_cleanup_interval: Duration,

    /// Token signing keys (random per process if unset)
    pub session_keys: Option<SessionKeys>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true, // Entries are small and must not wait
            request_timeout: Duration::from_secs(10),
            max_request_size: 64 * 1024, // 64KB
            nick_ttl: DEFAULT_NICK_TTL,
            nick_cleanup_interval: Duration::from_secs(5 * 60),
            session_keys: None,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set maximum request size
    pub fn max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = size;
        self
    }

    /// Set nickname lifetime
    pub fn nick_ttl(mut self, ttl: Duration) -> Self {
        self.nick_ttl = ttl;
        self
    }

    /// Set how often expired nicknames are purged
    pub fn nick_cleanup_interval(mut self, interval: Duration) -> Self {
        self.nick_cleanup_interval = interval;
        self
    }

    /// Set the token signing keys
    pub fn session_keys(mut self, keys: SessionKeys) -> Self {
        self.session_keys = Some(keys);
        self
    }
}
