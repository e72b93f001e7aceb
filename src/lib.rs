//! darkchat: a streaming HTML chat server
//!
//! Visitors register a nickname, receive a signed session cookie and open the
//! chat page. The page response never finishes: it replays every message
//! posted so far and then keeps appending new messages as they arrive, so the
//! chat works without any client-side scripting.
//!
//! # Example
//!
//! ```no_run
//! use darkchat::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> darkchat::Result<()> {
//!     let server = ChatServer::new(ServerConfig::default());
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

pub mod delivery;
pub mod error;
pub mod log;
pub mod page;
pub mod server;
pub mod session;

pub use error::{Error, Result};
pub use log::{BroadcastLog, Entry, Subscription};
pub use server::{ChatServer, ServerConfig};
