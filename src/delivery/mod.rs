//! Streaming delivery of log entries to one connection
//!
//! A [`DeliveryLoop`] owns a [`Subscription`](crate::log::Subscription) and a
//! [`FrameSink`]. It forwards every entry the subscription yields as soon as it
//! is available and only stops when it is cancelled.
//!
//! ```text
//!   OPEN ──► AWAIT_ENTRY ⇄ SEND_ENTRY
//!     │           │            │
//!     └───────────┴────────────┴──► CLOSED (unsubscribe)
//! ```

pub mod sink;
pub mod stream;

pub use sink::FrameSink;
pub use stream::{CloseReason, DeliveryLoop, DeliveryOutcome, DeliveryState};
