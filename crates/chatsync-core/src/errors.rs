//! Send error type.
//!
//! Serializable so adapters can hand it to a UI unchanged. Every variant that
//! follows a user action carries enough to restore the composer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a send did not result in a delivered message.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SendError {
    #[error("Message body is empty")]
    EmptyBody,

    #[error("No active conversation")]
    NoActiveConversation,

    /// An identical send is still pending within the debounce window.
    #[error("Identical message already in flight: {provisional_id}")]
    DuplicateInFlight { provisional_id: String },

    /// Both the live transport and the REST fallback failed. `body` is the
    /// original text.
    #[error("Send failed: {reason}")]
    Failed { body: String, reason: String },

    /// Only FAILED messages can be retried or discarded.
    #[error("Message is not in a failed state: {id}")]
    NotRetryable { id: String },
}

impl SendError {
    pub fn failed(body: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            body: body.into(),
            reason: reason.into(),
        }
    }

    /// Text to put back into the composer, if the error carries one.
    #[must_use]
    pub fn restorable_body(&self) -> Option<&str> {
        match self {
            Self::Failed { body, .. } => Some(body),
            _ => None,
        }
    }
}
