//! Per-connection transport
//!
//! Every accepted socket is wrapped in a [`ChatConnection`] before hyper sees
//! it. The wrapper holds the connection-limit permit for as long as the
//! socket lives and drops clients that have not sent a request in time.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Sleep;

use crate::session::SessionContext;

/// One accepted client connection
pub struct ChatConnection {
    stream: TcpStream,
    ctx: SessionContext,
    /// Fires if nothing was written back before the request timeout
    request_deadline: Option<Pin<Box<Sleep>>>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl ChatConnection {
    /// Wrap an accepted socket
    pub fn new(
        stream: TcpStream,
        ctx: SessionContext,
        request_timeout: Duration,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            stream,
            ctx,
            request_deadline: Some(Box::pin(tokio::time::sleep(request_timeout))),
            _permit: permit,
        }
    }

    /// Connection information
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// The response has started; the request deadline no longer applies
    fn response_started(&mut self) {
        self.request_deadline = None;
    }
}

impl AsyncRead for ChatConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if let Some(deadline) = this.request_deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                tracing::debug!(session_id = this.ctx.session_id, "Request timed out");
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "request not received in time",
                )));
            }
        }

        Pin::new(&mut this.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for ChatConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.response_started();
        Pin::new(&mut this.stream).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.response_started();
        Pin::new(&mut this.stream).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.stream.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        tracing::debug!(
            session_id = self.ctx.session_id,
            peer = %self.ctx.peer_addr,
            duration_ms = self.ctx.elapsed().as_millis() as u64,
            "Connection closed"
        );
    }
}
