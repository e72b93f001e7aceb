//! Session error types

use thiserror::Error;

/// Errors raised by nickname registration and session tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Nickname is empty")]
    EmptyNick,

    #[error("Nickname already taken: {0}")]
    NickTaken(String),

    #[error("No session token")]
    MissingToken,

    #[error("Malformed session token: {0}")]
    MalformedToken(String),

    #[error("Session token signature mismatch")]
    BadSignature,

    #[error("Session token expired at {expire}")]
    Expired { expire: u64 },

    #[error("Invalid session key: {0}")]
    InvalidKey(String),
}
