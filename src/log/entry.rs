//! Chat log entries
//!
//! An entry is the unit stored in the broadcast log and handed to every
//! subscriber.

use std::sync::Arc;

/// One immutable chat message
///
/// Both fields are stored exactly as received. Escaping happens at render time.
/// Cheap to clone: the text is shared between all subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Nickname of the sender
    pub sender: Arc<str>,
    /// Raw message text
    pub text: Arc<str>,
}

impl Entry {
    /// Create a new entry
    pub fn new(sender: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.sender, self.text)
    }
}
