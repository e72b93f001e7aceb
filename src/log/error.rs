//! Broadcast log error types

use super::subscription::SubscriptionId;

/// Error type for subscription operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    /// The subscription was removed from the log's subscriber set
    Unsubscribed(SubscriptionId),
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::Unsubscribed(id) => write!(f, "Subscription closed: {}", id),
        }
    }
}

impl std::error::Error for LogError {}
