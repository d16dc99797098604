//! Conversation summary types.
//!
//! A summary is the lightweight per-participant record shown in the
//! conversation list. It is distinct from the full message window owned by a
//! conversation store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;

/// Marketplace role of the other participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParticipantRole {
    Buyer,
    Seller,
    Admin,
    #[default]
    Unknown,
}

impl ParticipantRole {
    /// Parse a role leniently. Unrecognized values map to `Unknown`.
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" | "user" | "customer" => Self::Buyer,
            "seller" | "vendor" | "supplier" => Self::Seller,
            "admin" => Self::Admin,
            _ => Self::Unknown,
        }
    }

    /// Query-string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Admin => "admin",
            Self::Unknown => "unknown",
        }
    }
}

/// The other side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: ParticipantRole,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: ParticipantRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    /// A participant known only by id (e.g. first contact over the live
    /// channel). The id doubles as the display name.
    pub fn unnamed(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            role: ParticipantRole::Unknown,
        }
    }
}

/// Conversation list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub participant_id: String,
    pub participant_name: String,
    #[serde(default)]
    pub participant_role: ParticipantRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
}

impl ConversationSummary {
    /// A summary with no messages yet.
    #[must_use]
    pub fn empty(participant: Participant) -> Self {
        Self {
            participant_id: participant.id,
            participant_name: participant.name,
            participant_role: participant.role,
            last_message: None,
            unread_count: 0,
        }
    }

    /// Timestamp of the latest known message.
    #[must_use]
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_message.as_ref().map(|m| m.created_at)
    }
}

/// Filters passed through to the conversation-list fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationFilters {
    pub role: Option<ParticipantRole>,
    pub search: Option<String>,
    pub unread_only: bool,
}
