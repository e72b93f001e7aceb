//! The per-connection delivery loop

use std::future::Future;

use bytes::Bytes;

use crate::log::Subscription;
use crate::page;

use super::sink::FrameSink;

/// Where the delivery loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Connection open, preamble not yet written
    Open,
    /// Waiting for the subscription to yield an entry
    AwaitEntry,
    /// Writing a rendered entry to the sink
    SendEntry,
}

/// Why the delivery loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its side of the connection
    PeerClosed,
    /// The server is shutting down
    Shutdown,
    /// The subscription was removed from the log
    Unsubscribed,
    /// Writing to the connection failed
    WriteFailed,
}

/// Result of a finished delivery loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Why the loop stopped
    pub reason: CloseReason,
    /// State the loop was in when it stopped
    pub closed_from: DeliveryState,
    /// Number of entries written to the sink
    pub delivered: u64,
}

/// Streams a subscription onto one connection until cancelled
///
/// There is no normal completion: the log never ends, so the loop runs until
/// the cancel future resolves, the subscription is closed, or a write fails.
/// The subscription is unsubscribed on every one of these paths, and also
/// when the loop's future is dropped mid-flight.
pub struct DeliveryLoop<S> {
    subscription: Subscription,
    sink: S,
    preamble: Option<Bytes>,
}

impl<S: FrameSink> DeliveryLoop<S> {
    /// Create a loop delivering `subscription` to `sink`
    pub fn new(subscription: Subscription, sink: S) -> Self {
        Self {
            subscription,
            sink,
            preamble: None,
        }
    }

    /// Write `preamble` before the first entry
    pub fn with_preamble(mut self, preamble: impl Into<Bytes>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    /// Run until `cancel` resolves or delivery becomes impossible
    ///
    /// `cancel` is raced against both the wait for the next entry and every
    /// write; whichever it interrupts is abandoned immediately.
    pub async fn run<C>(mut self, cancel: C) -> DeliveryOutcome
    where
        C: Future<Output = CloseReason>,
    {
        tokio::pin!(cancel);

        let id = self.subscription.id();
        let mut state = DeliveryState::Open;
        let mut delivered: u64 = 0;

        let reason = 'delivery: {
            if let Some(preamble) = self.preamble.take() {
                tokio::select! {
                    biased;
                    reason = &mut cancel => break 'delivery reason,
                    result = self.sink.send_frame(preamble) => {
                        if let Err(e) = result {
                            tracing::debug!(subscription = %id, error = %e, "Preamble write failed");
                            break 'delivery CloseReason::WriteFailed;
                        }
                    }
                }
            }

            loop {
                state = DeliveryState::AwaitEntry;
                let entry = tokio::select! {
                    biased;
                    reason = &mut cancel => break 'delivery reason,
                    next = self.subscription.next() => match next {
                        Ok(entry) => entry,
                        Err(_) => break 'delivery CloseReason::Unsubscribed,
                    },
                };

                state = DeliveryState::SendEntry;
                let frame = page::message_item(&entry);
                tracing::trace!(subscription = %id, bytes = frame.len(), "Sending entry");

                tokio::select! {
                    biased;
                    reason = &mut cancel => break 'delivery reason,
                    result = self.sink.send_frame(frame) => {
                        if let Err(e) = result {
                            tracing::debug!(subscription = %id, error = %e, "Entry write failed");
                            break 'delivery CloseReason::WriteFailed;
                        }
                    }
                }

                delivered += 1;
            }
        };

        self.subscription.close();

        tracing::debug!(
            subscription = %id,
            reason = ?reason,
            closed_from = ?state,
            delivered = delivered,
            "Delivery closed"
        );

        DeliveryOutcome {
            reason,
            closed_from: state,
            delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::log::{BroadcastLog, Entry};

    /// Forwards frames to a channel; fails once `fail_after` frames were sent
    struct ChannelSink {
        tx: mpsc::UnboundedSender<Bytes>,
        fail_after: Option<usize>,
        sent: usize,
    }

    impl ChannelSink {
        fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let sink = Self {
                tx,
                fail_after: None,
                sent: 0,
            };
            (sink, rx)
        }

        fn failing_after(count: usize) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
            let (mut sink, rx) = Self::new();
            sink.fail_after = Some(count);
            (sink, rx)
        }
    }

    impl FrameSink for ChannelSink {
        async fn send_frame(&mut self, frame: Bytes) -> io::Result<()> {
            if self.fail_after.is_some_and(|limit| self.sent >= limit) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
            }
            self.sent += 1;
            self.tx
                .send(frame)
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver dropped"))
        }
    }

    fn stop_signal() -> (oneshot::Sender<CloseReason>, impl Future<Output = CloseReason>) {
        let (tx, rx) = oneshot::channel();
        let cancel = async move { rx.await.unwrap_or(CloseReason::PeerClosed) };
        (tx, cancel)
    }

    #[tokio::test]
    async fn test_replay_then_live_tail() {
        let log = Arc::new(BroadcastLog::new());
        log.append(Entry::new("a", "1"));

        let (sink, mut frames) = ChannelSink::new();
        let (stop, cancel) = stop_signal();
        let delivery = DeliveryLoop::new(log.subscribe(), sink).with_preamble("<ul>");
        let handle = tokio::spawn(delivery.run(cancel));

        assert_eq!(frames.recv().await.unwrap(), Bytes::from_static(b"<ul>"));
        assert_eq!(
            frames.recv().await.unwrap(),
            page::message_item(&Entry::new("a", "1"))
        );

        log.append(Entry::new("b", "2"));
        assert_eq!(
            frames.recv().await.unwrap(),
            page::message_item(&Entry::new("b", "2"))
        );

        stop.send(CloseReason::Shutdown).unwrap();
        let outcome = handle.await.unwrap();

        assert_eq!(outcome.reason, CloseReason::Shutdown);
        assert_eq!(outcome.closed_from, DeliveryState::AwaitEntry);
        assert_eq!(outcome.delivered, 2);
        assert_eq!(log.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_open() {
        let log = Arc::new(BroadcastLog::new());
        log.append(Entry::new("a", "1"));

        let (sink, mut frames) = ChannelSink::new();
        let delivery = DeliveryLoop::new(log.subscribe(), sink).with_preamble("<ul>");
        let outcome = delivery.run(async { CloseReason::PeerClosed }).await;

        assert_eq!(outcome.reason, CloseReason::PeerClosed);
        assert_eq!(outcome.closed_from, DeliveryState::Open);
        assert_eq!(outcome.delivered, 0);
        assert_eq!(log.subscriber_count(), 0);
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_write_failure_unsubscribes() {
        let log = Arc::new(BroadcastLog::new());
        for i in 0..3 {
            log.append(Entry::new("a", i.to_string()));
        }

        let (sink, mut frames) = ChannelSink::failing_after(2);
        let (_stop, cancel) = stop_signal();
        let outcome = DeliveryLoop::new(log.subscribe(), sink).run(cancel).await;

        assert_eq!(outcome.reason, CloseReason::WriteFailed);
        assert_eq!(outcome.closed_from, DeliveryState::SendEntry);
        assert_eq!(outcome.delivered, 2);
        assert_eq!(log.subscriber_count(), 0);

        assert!(frames.recv().await.is_some());
        assert!(frames.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_blocked_loop() {
        let log = Arc::new(BroadcastLog::new());
        let (sink, _frames) = ChannelSink::new();
        let (_stop, cancel) = stop_signal();

        let handle = tokio::spawn(DeliveryLoop::new(log.subscribe(), sink).run(cancel));
        tokio::task::yield_now().await;

        assert_eq!(log.close_all(), 1);
        let outcome = handle.await.unwrap();

        assert_eq!(outcome.reason, CloseReason::Unsubscribed);
        assert_eq!(outcome.closed_from, DeliveryState::AwaitEntry);
        assert_eq!(outcome.delivered, 0);
    }

    #[tokio::test]
    async fn test_aborted_loop_unsubscribes() {
        let log = Arc::new(BroadcastLog::new());
        let (sink, _frames) = ChannelSink::new();
        let (_stop, cancel) = stop_signal();

        let handle = tokio::spawn(DeliveryLoop::new(log.subscribe(), sink).run(cancel));
        tokio::task::yield_now().await;
        assert_eq!(log.subscriber_count(), 1);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(log.subscriber_count(), 0);
    }
}
