//! Nickname registry
//!
//! A nickname belongs to whoever registered it until its expiry passes. After
//! that anyone may claim it again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use super::error::SessionError;

/// Default nickname lifetime (8 hours)
pub const DEFAULT_NICK_TTL: Duration = Duration::from_secs(8 * 60 * 60);

/// Current time as seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Registered nicknames and their expiry times
#[derive(Debug)]
pub struct NickRegistry {
    /// Nickname -> expiry (epoch seconds)
    nicks: Mutex<HashMap<String, u64>>,
    ttl: Duration,
}

impl NickRegistry {
    /// Create a registry whose registrations last `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            nicks: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Registration lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Claim `nick` at time `now`
    ///
    /// Returns the expiry of the new registration. Fails without touching the
    /// registry if the nickname is empty or still held.
    pub fn register(&self, nick: &str, now: u64) -> Result<u64, SessionError> {
        if nick.is_empty() {
            return Err(SessionError::EmptyNick);
        }

        let mut nicks = self.nicks.lock();

        if let Some(&expire) = nicks.get(nick) {
            if expire > now {
                return Err(SessionError::NickTaken(nick.to_string()));
            }
        }

        let expire = now.saturating_add(self.ttl.as_secs());
        nicks.insert(nick.to_string(), expire);

        tracing::info!(nick = nick, expire = expire, "Nickname registered");

        Ok(expire)
    }

    /// Check if `nick` is held at time `now`
    pub fn is_held(&self, nick: &str, now: u64) -> bool {
        self.nicks
            .lock()
            .get(nick)
            .is_some_and(|&expire| expire > now)
    }

    /// Drop registrations that expired before `now`; returns how many
    pub fn purge_expired(&self, now: u64) -> usize {
        let mut nicks = self.nicks.lock();
        let before = nicks.len();
        nicks.retain(|_, expire| *expire > now);
        before - nicks.len()
    }

    /// Number of stored registrations, expired or not
    pub fn len(&self) -> usize {
        self.nicks.lock().len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let purged = registry.purge_expired(unix_now());
                if purged > 0 {
                    tracing::debug!(purged = purged, "Expired nicknames removed");
                }
            }
        })
    }
}

impl Default for NickRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_NICK_TTL)
    }
}
