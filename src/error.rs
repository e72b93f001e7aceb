//! Crate-level error type

use thiserror::Error;

use crate::session::SessionError;

/// Main error type for server operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, Error>;
