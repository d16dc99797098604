//! Sync events and view state.
//!
//! # Structure
//!
//! - `SyncEvent` - discrete things that happened, sent through the
//!   `SyncEventEmitter` port
//! - `view` - the continuously published `ViewState` snapshot
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "send_timed_out", "participantId": "42", "messageId": "temp-1-0", "body": "hi" }
//! ```

mod view;

use serde::{Deserialize, Serialize};

use crate::domain::Message;

pub use view::{PaginationView, ViewState};

/// Canonical sync events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SyncEvent {
    // ========== Conversation Events ==========
    /// A conversation became active.
    ConversationSelected {
        participant_id: String,
        generation: u64,
    },

    // ========== Message Events ==========
    /// A new message was accepted into a conversation.
    MessageAccepted {
        participant_id: String,
        message: Message,
    },

    /// A provisional message was replaced by its authoritative copy.
    MessageReconciled {
        participant_id: String,
        provisional_id: String,
        message_id: String,
    },

    /// A live payload was dropped at the normalization boundary.
    MessageRejected { reason: String },

    // ========== Send Events ==========
    /// Both send paths failed. The provisional entry is gone; `body` is the
    /// original text.
    SendFailed {
        participant_id: String,
        body: String,
        reason: String,
    },

    /// A pending send was not confirmed in time and is now FAILED.
    SendTimedOut {
        participant_id: String,
        message_id: String,
        body: String,
    },

    // ========== Pagination Events ==========
    /// A history page was merged.
    PageLoaded {
        participant_id: String,
        page: u32,
        count: usize,
        has_more: bool,
    },

    /// A history fetch failed.
    PageLoadFailed {
        participant_id: String,
        page: u32,
        error: String,
    },

    /// A response arrived for a conversation that is no longer active.
    StaleResponseDiscarded {
        participant_id: String,
        page: u32,
        generation: u64,
    },
}

impl SyncEvent {
    /// Get the event name for routing.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ConversationSelected { .. } => "conversation:selected",
            Self::MessageAccepted { .. } => "message:accepted",
            Self::MessageReconciled { .. } => "message:reconciled",
            Self::MessageRejected { .. } => "message:rejected",
            Self::SendFailed { .. } => "send:failed",
            Self::SendTimedOut { .. } => "send:timed_out",
            Self::PageLoaded { .. } => "page:loaded",
            Self::PageLoadFailed { .. } => "page:load_failed",
            Self::StaleResponseDiscarded { .. } => "page:stale_discarded",
        }
    }

    pub fn conversation_selected(participant_id: impl Into<String>, generation: u64) -> Self {
        Self::ConversationSelected {
            participant_id: participant_id.into(),
            generation,
        }
    }

    pub fn message_accepted(participant_id: impl Into<String>, message: Message) -> Self {
        Self::MessageAccepted {
            participant_id: participant_id.into(),
            message,
        }
    }

    pub fn message_reconciled(
        participant_id: impl Into<String>,
        provisional_id: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self::MessageReconciled {
            participant_id: participant_id.into(),
            provisional_id: provisional_id.into(),
            message_id: message_id.into(),
        }
    }

    pub fn message_rejected(reason: impl Into<String>) -> Self {
        Self::MessageRejected {
            reason: reason.into(),
        }
    }

    pub fn send_failed(
        participant_id: impl Into<String>,
        body: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SendFailed {
            participant_id: participant_id.into(),
            body: body.into(),
            reason: reason.into(),
        }
    }

    pub fn send_timed_out(
        participant_id: impl Into<String>,
        message_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::SendTimedOut {
            participant_id: participant_id.into(),
            message_id: message_id.into(),
            body: body.into(),
        }
    }

    pub fn page_loaded(
        participant_id: impl Into<String>,
        page: u32,
        count: usize,
        has_more: bool,
    ) -> Self {
        Self::PageLoaded {
            participant_id: participant_id.into(),
            page,
            count,
            has_more,
        }
    }

    pub fn page_load_failed(
        participant_id: impl Into<String>,
        page: u32,
        error: impl Into<String>,
    ) -> Self {
        Self::PageLoadFailed {
            participant_id: participant_id.into(),
            page,
            error: error.into(),
        }
    }

    pub fn stale_response_discarded(
        participant_id: impl Into<String>,
        page: u32,
        generation: u64,
    ) -> Self {
        Self::StaleResponseDiscarded {
            participant_id: participant_id.into(),
            page,
            generation,
        }
    }
}
