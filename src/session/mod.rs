//! Identity: nickname registrations and signed session tokens
//!
//! Registering a nickname records it in the [`NickRegistry`] and hands the
//! client a token minted by [`SessionKeys`]. Every chat request presents the
//! token back as the `jwt` cookie.

pub mod context;
pub mod error;
pub mod nicks;
pub mod token;

pub use context::SessionContext;
pub use error::SessionError;
pub use nicks::{unix_now, NickRegistry, DEFAULT_NICK_TTL};
pub use token::{Claims, SessionKeys};

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "jwt";
