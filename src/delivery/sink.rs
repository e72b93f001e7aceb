//! Outbound frame sinks

use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Destination for rendered frames
///
/// Each call hands the frame to the connection before returning; delivery
/// never batches frames that are already available.
pub trait FrameSink: Send {
    /// Send one frame
    fn send_frame(&mut self, frame: Bytes) -> impl Future<Output = std::io::Result<()>> + Send;
}

/// Feeds a response body stream; fails once the body was dropped
impl FrameSink for mpsc::Sender<Bytes> {
    async fn send_frame(&mut self, frame: Bytes) -> std::io::Result<()> {
        self.send(frame).await.map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "response body dropped")
        })
    }
}
