//! Broadcast log implementation
//!
//! The append-only message history together with the set of active
//! subscriptions that must be woken whenever it grows.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::entry::Entry;
use super::subscription::{Subscription, SubscriptionId, Waiter};

/// State guarded by the log lock
struct LogInner {
    /// Every entry ever appended, in append order
    entries: Vec<Entry>,
    /// Wake-up handles of the active subscriptions
    subscribers: HashMap<SubscriptionId, Arc<Waiter>>,
}

/// Shared, append-only, totally ordered chat history
///
/// A single mutex serializes appends against the catch-up check inside
/// [`Subscription::next`], so every subscriber observes the same order and
/// no append can slip between "nothing new" and "waiting".
pub struct BroadcastLog {
    inner: Mutex<LogInner>,

    /// Counter for generating subscription IDs
    next_id: AtomicU64,
}

impl BroadcastLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                entries: Vec::new(),
                subscribers: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append an entry and wake every active subscription
    ///
    /// Returns the index the entry was stored at.
    pub fn append(&self, entry: Entry) -> usize {
        let mut inner = self.inner.lock();

        let index = inner.entries.len();
        inner.entries.push(entry);

        // Notify under the lock: a waiter either sees the new length or
        // finds a stored permit.
        for waiter in inner.subscribers.values() {
            waiter.wake();
        }

        tracing::debug!(
            index = index,
            subscribers = inner.subscribers.len(),
            "Entry appended"
        );

        index
    }

    /// Number of entries in the log
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if nothing has been appended yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the entry at `index`
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the end of the log. Cursors never point past
    /// the end, so this indicates a bug rather than bad input.
    pub fn get(&self, index: usize) -> Entry {
        let inner = self.inner.lock();
        assert!(
            index < inner.entries.len(),
            "log index {} out of range (len {})",
            index,
            inner.entries.len()
        );
        inner.entries[index].clone()
    }

    /// Entry at `index`, or `None` if the log has not grown that far yet
    pub(super) fn entry_at(&self, index: usize) -> Option<Entry> {
        self.inner.lock().entries.get(index).cloned()
    }

    /// Create a subscription positioned before the first entry
    ///
    /// The subscription replays the whole history before following the tail.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let waiter = Arc::new(Waiter::new());

        let subscribers = {
            let mut inner = self.inner.lock();
            inner.subscribers.insert(id, Arc::clone(&waiter));
            inner.subscribers.len()
        };

        tracing::debug!(subscription = %id, subscribers = subscribers, "Subscriber added");

        Subscription::new(id, Arc::clone(self), waiter)
    }

    /// Remove a subscription from the subscriber set
    ///
    /// Releases the subscription if it is currently waiting for an entry; its
    /// pending and future `next()` calls return [`LogError::Unsubscribed`].
    /// Safe to call more than once. Returns `true` if the subscription was
    /// still active.
    ///
    /// [`LogError::Unsubscribed`]: super::LogError::Unsubscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let (waiter, remaining) = {
            let mut inner = self.inner.lock();
            let waiter = inner.subscribers.remove(&id);
            (waiter, inner.subscribers.len())
        };

        match waiter {
            Some(waiter) => {
                waiter.close();
                tracing::debug!(subscription = %id, subscribers = remaining, "Subscriber removed");
                true
            }
            None => false,
        }
    }

    /// Unsubscribe every active subscription
    ///
    /// Used on shutdown to release all blocked delivery loops. Returns the
    /// number of subscriptions closed.
    pub fn close_all(&self) -> usize {
        let waiters: Vec<Arc<Waiter>> = {
            let mut inner = self.inner.lock();
            inner.subscribers.drain().map(|(_, waiter)| waiter).collect()
        };

        for waiter in &waiters {
            waiter.close();
        }

        if !waiters.is_empty() {
            tracing::info!(closed = waiters.len(), "Closed all subscriptions");
        }

        waiters.len()
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl Default for BroadcastLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::log::LogError;

    fn shared_log() -> Arc<BroadcastLog> {
        Arc::new(BroadcastLog::new())
    }

    #[test]
    fn test_append_and_get() {
        let log = BroadcastLog::new();
        assert!(log.is_empty());

        assert_eq!(log.append(Entry::new("a", "1")), 0);
        assert_eq!(log.append(Entry::new("b", "2")), 1);

        assert_eq!(log.len(), 2);
        assert_eq!(log.get(0), Entry::new("a", "1"));
        assert_eq!(log.get(1), Entry::new("b", "2"));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_get_past_end_panics() {
        let log = BroadcastLog::new();
        log.append(Entry::new("a", "1"));
        let _ = log.get(1);
    }

    #[test]
    fn test_append_then_next() {
        let log = shared_log();
        let mut sub = log.subscribe();

        log.append(Entry::new("alice", "hi"));

        let mut next = task::spawn(sub.next());
        let entry = assert_ready!(next.poll()).unwrap();
        assert_eq!(entry, Entry::new("alice", "hi"));
        drop(next);

        assert_eq!(log.len(), 1);
        assert_eq!(sub.cursor(), Some(0));
    }

    #[test]
    fn test_replay_history_without_blocking() {
        let log = shared_log();
        log.append(Entry::new("a", "1"));
        log.append(Entry::new("b", "2"));
        log.append(Entry::new("c", "3"));

        let mut sub = log.subscribe();
        assert_eq!(sub.cursor(), None);

        for expected in [Entry::new("a", "1"), Entry::new("b", "2"), Entry::new("c", "3")] {
            let mut next = task::spawn(sub.next());
            assert_eq!(assert_ready!(next.poll()).unwrap(), expected);
        }

        // Caught up: the fourth call waits for a new append
        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());

        log.append(Entry::new("d", "4"));
        assert!(next.is_woken());
        assert_eq!(assert_ready!(next.poll()).unwrap(), Entry::new("d", "4"));
    }

    #[test]
    fn test_no_lost_wakeup_while_blocked() {
        let log = shared_log();
        let mut sub = log.subscribe();

        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());
        assert!(!next.is_woken());

        log.append(Entry::new("x", "late"));

        assert!(next.is_woken());
        assert_eq!(assert_ready!(next.poll()).unwrap(), Entry::new("x", "late"));
    }

    #[test]
    fn test_no_lost_wakeup_between_check_and_wait() {
        let log = shared_log();
        let mut sub = log.subscribe();

        // The catch-up check finds nothing...
        assert_eq!(sub.try_next().unwrap(), None);

        // ...an append lands before the wait is registered...
        log.append(Entry::new("x", "gap"));
        assert_eq!(sub.try_next().unwrap(), Some(Entry::new("x", "gap")));

        // ...and the stored permit only causes a spurious re-check.
        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());
        log.append(Entry::new("y", "after"));
        assert_eq!(assert_ready!(next.poll()).unwrap(), Entry::new("y", "after"));
    }

    #[test]
    fn test_unsubscribe_releases_blocked_wait() {
        let log = shared_log();
        let mut sub = log.subscribe();
        let id = sub.id();

        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());

        assert!(log.unsubscribe(id));
        assert!(next.is_woken());
        assert_eq!(assert_ready!(next.poll()), Err(LogError::Unsubscribed(id)));
        assert_eq!(log.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let log = shared_log();
        let first = log.subscribe();
        let mut second = log.subscribe();
        assert_eq!(log.subscriber_count(), 2);

        assert!(log.unsubscribe(first.id()));
        assert!(!log.unsubscribe(first.id()));
        assert_eq!(log.subscriber_count(), 1);

        // The other subscriber is unaffected
        log.append(Entry::new("a", "1"));
        assert_eq!(second.try_next().unwrap(), Some(Entry::new("a", "1")));

        // Dropping an already removed subscription is a no-op
        drop(first);
        assert_eq!(log.subscriber_count(), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let log = shared_log();
        let sub = log.subscribe();
        assert_eq!(log.subscriber_count(), 1);

        drop(sub);
        assert_eq!(log.subscriber_count(), 0);
    }

    #[test]
    fn test_close_all() {
        let log = shared_log();
        let mut a = log.subscribe();
        let mut b = log.subscribe();

        assert_eq!(log.close_all(), 2);
        assert_eq!(log.subscriber_count(), 0);
        assert!(a.try_next().is_err());
        assert!(b.try_next().is_err());
        assert_eq!(log.close_all(), 0);
    }

    #[tokio::test]
    async fn test_cancel_blocked_subscriber() {
        let log = shared_log();
        let before = log.subscriber_count();

        let mut sub = log.subscribe();
        let handle = tokio::spawn(async move {
            let _ = sub.next().await;
        });

        // Let the task reach the wait
        tokio::task::yield_now().await;
        assert_eq!(log.subscriber_count(), before + 1);

        handle.abort();
        let result = handle.await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(log.subscriber_count(), before);
    }

    #[tokio::test]
    async fn test_no_leaked_waiters() {
        let log = shared_log();
        let mut handles = Vec::new();

        for _ in 0..32 {
            let mut sub = log.subscribe();
            handles.push(tokio::spawn(async move {
                loop {
                    if sub.next().await.is_err() {
                        break;
                    }
                }
            }));
        }
        assert_eq!(log.subscriber_count(), 32);

        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            let result = tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("task should terminate");
            assert!(result.unwrap_err().is_cancelled());
        }

        assert_eq!(log.subscriber_count(), 0);
        assert!(log.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_share_one_order() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 50;
        const TOTAL: usize = PRODUCERS * PER_PRODUCER;

        let log = shared_log();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let mut sub = log.subscribe();
                tokio::spawn(async move {
                    let mut seen = Vec::with_capacity(TOTAL);
                    while seen.len() < TOTAL {
                        seen.push(sub.next().await.unwrap());
                    }
                    seen
                })
            })
            .collect();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    for i in 0..PER_PRODUCER {
                        log.append(Entry::new(format!("p{}", p), format!("m{}", i)));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.await.unwrap();
        }

        let expected: Vec<Entry> = (0..TOTAL).map(|i| log.get(i)).collect();
        for consumer in consumers {
            let seen = tokio::time::timeout(Duration::from_secs(5), consumer)
                .await
                .expect("consumer should finish")
                .unwrap();
            assert_eq!(seen, expected);
        }

        // Per-producer order is preserved inside the global order
        for p in 0..PRODUCERS {
            let sender = format!("p{}", p);
            let texts: Vec<String> = expected
                .iter()
                .filter(|e| *e.sender == *sender)
                .map(|e| e.text.to_string())
                .collect();
            let wanted: Vec<String> = (0..PER_PRODUCER).map(|i| format!("m{}", i)).collect();
            assert_eq!(texts, wanted);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_producers_two_subscribers() {
        let log = shared_log();
        let mut s1 = log.subscribe();
        let mut s2 = log.subscribe();

        let l1 = Arc::clone(&log);
        let l2 = Arc::clone(&log);
        let (a, b) = tokio::join!(
            tokio::spawn(async move { l1.append(Entry::new("x", "m1")) }),
            tokio::spawn(async move { l2.append(Entry::new("y", "m2")) }),
        );
        a.unwrap();
        b.unwrap();

        let first = vec![s1.next().await.unwrap(), s1.next().await.unwrap()];
        let second = vec![s2.next().await.unwrap(), s2.next().await.unwrap()];
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }
}
