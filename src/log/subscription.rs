//! Per-connection read cursors over the broadcast log

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use super::entry::Entry;
use super::error::LogError;
use super::store::BroadcastLog;

/// Unique identifier for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Wake-up handle shared between a subscription and the log's subscriber set
pub(super) struct Waiter {
    notify: Notify,
    closed: AtomicBool,
}

impl Waiter {
    pub(super) fn new() -> Self {
        Self {
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Signal that the log grew
    ///
    /// `notify_one` keeps a permit if the subscription is not waiting yet.
    pub(super) fn wake(&self) {
        self.notify.notify_one();
    }

    /// Mark the subscription as removed and release any pending wait
    pub(super) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Read cursor over a [`BroadcastLog`]
///
/// Starts before the first entry, so the first calls to [`next`](Self::next)
/// replay the whole history without waiting. Once caught up, `next` waits for
/// the next append.
///
/// Dropping the subscription (including dropping a task blocked in `next`)
/// removes it from the log's subscriber set.
pub struct Subscription {
    id: SubscriptionId,
    log: Arc<BroadcastLog>,
    waiter: Arc<Waiter>,
    /// Index of the next entry to deliver (cursor + 1)
    next_index: usize,
}

impl Subscription {
    pub(super) fn new(id: SubscriptionId, log: Arc<BroadcastLog>, waiter: Arc<Waiter>) -> Self {
        Self {
            id,
            log,
            waiter,
            next_index: 0,
        }
    }

    /// Get the subscription ID
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Index of the last delivered entry, `None` before the first delivery
    pub fn cursor(&self) -> Option<usize> {
        self.next_index.checked_sub(1)
    }

    /// Check if the subscription was removed from the log
    pub fn is_closed(&self) -> bool {
        self.waiter.is_closed()
    }

    /// Take the next entry if one is already available
    pub fn try_next(&mut self) -> Result<Option<Entry>, LogError> {
        if self.waiter.is_closed() {
            return Err(LogError::Unsubscribed(self.id));
        }

        match self.log.entry_at(self.next_index) {
            Some(entry) => {
                self.next_index += 1;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Wait for the next entry
    ///
    /// Returns immediately while replaying history. Cancel-safe: dropping the
    /// future never skips an entry. Fails once the subscription is
    /// unsubscribed, including while waiting.
    pub async fn next(&mut self) -> Result<Entry, LogError> {
        loop {
            if let Some(entry) = self.try_next()? {
                return Ok(entry);
            }

            self.waiter.notify.notified().await;
        }
    }

    /// Remove this subscription from the log
    pub fn close(&self) {
        self.log.unsubscribe(self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.log.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cursor", &self.cursor())
            .field("closed", &self.is_closed())
            .finish()
    }
}
