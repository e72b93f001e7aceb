//! Broadcast log for chat fan-out
//!
//! The log is the single ordered history of chat messages. Every viewer holds a
//! [`Subscription`], a read cursor that first replays the whole history and then
//! follows the live tail.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<BroadcastLog>
//!                     ┌─────────────────────────┐
//!                     │ Mutex<LogInner {        │
//!                     │   entries: Vec<Entry>,  │
//!                     │   subscribers: HashMap< │
//!                     │     SubscriptionId,     │
//!                     │     Arc<Waiter>>,       │
//!                     │ }>                      │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!      [Poster]             [Subscription]          [Subscription]
//!      log.append()         sub.next().await        sub.next().await
//!         │                       │                       │
//!         └──► push + notify_one ─┴──► DeliveryLoop ──► TCP
//! ```
//!
//! # Wake-ups
//!
//! Each subscription owns a `tokio::sync::Notify`. `append` calls
//! `notify_one` on every waiter while still holding the log lock, and
//! `notify_one` stores a permit when nobody is waiting yet. A subscription
//! that found no new entry under the lock and then awaits its `Notify`
//! therefore always observes an append that happened in between.
//!
//! # Zero-Copy Entries
//!
//! [`Entry`] holds `Arc<str>` fields, so replaying the history to a new viewer
//! clones reference counts rather than message text.

pub mod entry;
pub mod error;
pub mod store;
pub mod subscription;

pub use entry::Entry;
pub use error::LogError;
pub use store::BroadcastLog;
pub use subscription::{Subscription, SubscriptionId};
