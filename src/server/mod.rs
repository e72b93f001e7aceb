//! HTTP chat server
//!
//! `ChatServer` accepts connections through a `ChatListener` and serves the
//! axum router from `routes`, which hands each request to `ChatApp`.

pub mod app;
pub mod config;
pub mod connection;
pub mod form;
pub mod listener;
pub mod routes;

pub use app::{ChatApp, Reply};
pub use config::ServerConfig;
pub use form::FormFields;
pub use listener::{ChatListener, ChatServer};
pub use routes::{router, ChatState};
