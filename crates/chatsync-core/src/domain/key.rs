//! Content-derived message identity.
//!
//! Used wherever a trustworthy server id is not yet known: matching an echo
//! to its optimistic send, and debouncing repeated sends.

use super::message::Message;

/// Collapse whitespace runs and trim. Case is preserved.
#[must_use]
pub fn normalize_body(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sender, recipient and normalized body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    pub from_id: String,
    pub to_id: String,
    pub body: String,
}

impl ContentKey {
    #[must_use]
    pub fn of(message: &Message) -> Self {
        Self::new(&message.from_id, &message.to_id, &message.body)
    }

    #[must_use]
    pub fn new(from_id: &str, to_id: &str, body: &str) -> Self {
        Self {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            body: normalize_body(body),
        }
    }
}

/// Content key plus the creation time bucketed to whole windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub content: ContentKey,
    pub bucket: i64,
}

/// Derive the stable identity of `message`, bucketing `created_at` to
/// `bucket_secs` (values below 1 are treated as 1).
#[must_use]
pub fn identify(message: &Message, bucket_secs: u32) -> MessageKey {
    let width = i64::from(bucket_secs.max(1));
    MessageKey {
        content: ContentKey::of(message),
        bucket: message.created_at.timestamp().div_euclid(width),
    }
}
