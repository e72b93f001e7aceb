//! Chat server listener
//!
//! Handles the TCP accept loop and serves the chat router on every
//! accepted connection.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};

use crate::error::Result;
use crate::server::app::ChatApp;
use crate::server::config::ServerConfig;
use crate::server::connection::ChatConnection;
use crate::server::routes::{self, ChatState};
use crate::session::SessionContext;

/// Pause after a failed accept before trying again
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP listener that enforces the connection limit and socket options
pub struct ChatListener {
    inner: TcpListener,
    connection_semaphore: Option<Arc<Semaphore>>,
    tcp_nodelay: bool,
    request_timeout: Duration,
    next_session_id: u64,
}

impl ChatListener {
    /// Wrap a bound listener using the limits from `config`
    pub fn new(inner: TcpListener, config: &ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            inner,
            connection_semaphore,
            tcp_nodelay: config.tcp_nodelay,
            request_timeout: config.request_timeout,
            next_session_id: 1,
        }
    }
}

impl axum::serve::Listener for ChatListener {
    type Io = ChatConnection;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let (socket, peer_addr) = match self.inner.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            };

            // Check connection limit
            let permit = match &self.connection_semaphore {
                Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                        continue;
                    }
                },
                None => None,
            };

            if self.tcp_nodelay {
                if let Err(e) = socket.set_nodelay(true) {
                    tracing::error!(error = %e, "Failed to configure socket");
                    continue;
                }
            }

            let session_id = self.next_session_id;
            self.next_session_id += 1;

            tracing::debug!(
                session_id = session_id,
                peer = %peer_addr,
                "New connection"
            );

            let ctx = SessionContext::new(session_id, peer_addr);
            let connection = ChatConnection::new(socket, ctx, self.request_timeout, permit);
            return (connection, peer_addr);
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

/// Peer address handed to the routes as connect info
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChatPeer(pub(crate) SocketAddr);

impl axum::extract::connect_info::Connected<axum::serve::IncomingStream<'_, ChatListener>>
    for ChatPeer
{
    fn connect_info(stream: axum::serve::IncomingStream<'_, ChatListener>) -> Self {
        ChatPeer(*stream.remote_addr())
    }
}

/// Chat server
pub struct ChatServer {
    config: ServerConfig,
    app: Arc<ChatApp>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ChatServer {
    /// Create a new server with fresh chat state
    pub fn new(config: ServerConfig) -> Self {
        let app = ChatApp::from_config(&config);
        Self::with_app(config, app)
    }

    /// Create a server around existing chat state
    pub fn with_app(config: ServerConfig, app: ChatApp) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            app: Arc::new(app),
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Get a reference to the chat state
    pub fn app(&self) -> &Arc<ChatApp> {
        &self.app
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from an already bound listener until `shutdown` resolves
    ///
    /// Open chat streams are ended and every subscription released before
    /// this returns.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Clear the flag left by an earlier run
        self.shutdown_tx.send_replace(false);

        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Chat server listening");

        // Spawn cleanup task for expired nicknames
        let cleanup_handle = self
            .app
            .nicks()
            .spawn_cleanup_task(self.config.nick_cleanup_interval);

        let state = ChatState::new(Arc::clone(&self.app), self.shutdown_tx.subscribe());
        let router = routes::router(state, self.config.max_request_size);
        let listener = ChatListener::new(listener, &self.config);

        let shutdown_tx = Arc::clone(&self.shutdown_tx);
        let log = Arc::clone(self.app.log());
        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");

            // End every open stream
            shutdown_tx.send_replace(true);
            let closed = log.close_all();
            tracing::debug!(subscriptions = closed, "Streams closed");
        };

        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<ChatPeer>(),
        )
        .with_graceful_shutdown(signal)
        .await;

        cleanup_handle.abort();
        tracing::info!("Chat server stopped");

        Ok(result?)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
