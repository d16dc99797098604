//! Message domain types.
//!
//! A [`Message`] is the unit every sync component works on. Messages that the
//! server has persisted carry the server id; optimistic sends carry a
//! provisional `temp-` id until their echo or REST confirmation arrives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix shared by every locally generated message id.
pub const PROVISIONAL_ID_PREFIX: &str = "temp-";

/// Build a provisional id for a message created at `created_at`.
///
/// The sequence number keeps ids unique when two sends land in the same
/// millisecond.
#[must_use]
pub fn provisional_id(created_at: DateTime<Utc>, seq: u64) -> String {
    format!(
        "{PROVISIONAL_ID_PREFIX}{}-{seq}",
        created_at.timestamp_millis()
    )
}

/// Returns true if `id` was generated locally rather than by the server.
#[must_use]
pub fn is_provisional_id(id: &str) -> bool {
    id.starts_with(PROVISIONAL_ID_PREFIX)
}

/// Kind of content carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Text,
    File,
    Image,
    Other,
}

impl MessageType {
    /// Parse a message type leniently. Unknown values map to `Other`.
    #[must_use]
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "TEXT" | "" => Self::Text,
            "FILE" => Self::File,
            "IMAGE" => Self::Image,
            _ => Self::Other,
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::File => "FILE",
            Self::Image => "IMAGE",
            Self::Other => "OTHER",
        }
    }

    /// Whether this type carries an attachment instead of (or next to) text.
    #[must_use]
    pub const fn is_attachment(&self) -> bool {
        matches!(self, Self::File | Self::Image)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local delivery state. Never persisted server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryState {
    /// Shown optimistically, waiting for the server.
    Pending,
    /// Persisted by the server.
    #[default]
    Confirmed,
    /// No confirmation arrived in time, or both send paths failed.
    Failed,
}

/// A chat message between two participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server id, or a provisional `temp-` id before confirmation.
    #[serde(default)]
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub message_type: MessageType,
    /// Ordering key.
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub delivery_state: DeliveryState,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default)]
    pub deleted_by_sender: bool,
    #[serde(default)]
    pub deleted_by_receiver: bool,
}

impl Message {
    /// Create a confirmed text message.
    pub fn new(
        id: impl Into<String>,
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            body: body.into(),
            message_type: MessageType::Text,
            created_at,
            delivery_state: DeliveryState::Confirmed,
            is_read: false,
            read_at: None,
            file_url: None,
            deleted_by_sender: false,
            deleted_by_receiver: false,
        }
    }

    /// Create a pending message with a provisional id.
    pub fn provisional(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self::new(
            provisional_id(created_at, seq),
            from_id,
            to_id,
            body,
            created_at,
        )
        .with_delivery_state(DeliveryState::Pending)
    }

    /// Set the message type.
    #[must_use]
    pub const fn with_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    /// Set the delivery state.
    #[must_use]
    pub const fn with_delivery_state(mut self, state: DeliveryState) -> Self {
        self.delivery_state = state;
        self
    }

    /// Attach a file URL.
    #[must_use]
    pub fn with_file_url(mut self, url: impl Into<String>) -> Self {
        self.file_url = Some(url.into());
        self
    }

    /// True for locally generated ids.
    #[must_use]
    pub fn is_provisional(&self) -> bool {
        is_provisional_id(&self.id)
    }

    /// True when the id came from the server.
    #[must_use]
    pub fn has_server_id(&self) -> bool {
        !self.id.is_empty() && !self.is_provisional()
    }

    /// True while waiting for server confirmation.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.delivery_state == DeliveryState::Pending
    }

    /// Structural validity: both participants present, and either a
    /// non-blank body or an attachment URL.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let has_content = !self.body.trim().is_empty()
            || (self.message_type.is_attachment() && self.file_url.is_some());
        !self.from_id.trim().is_empty() && !self.to_id.trim().is_empty() && has_content
    }

    /// The other side of the conversation from `current_user_id`'s point of
    /// view, or `None` if the message does not involve that user.
    #[must_use]
    pub fn counterpart(&self, current_user_id: &str) -> Option<&str> {
        if self.from_id == current_user_id {
            Some(&self.to_id)
        } else if self.to_id == current_user_id {
            Some(&self.from_id)
        } else {
            None
        }
    }

    /// Adopt the authoritative attributes of `confirmed`, keeping this
    /// message's ordering timestamp.
    pub fn adopt_confirmation(&mut self, confirmed: &Self) {
        self.id.clone_from(&confirmed.id);
        self.delivery_state = DeliveryState::Confirmed;
        self.message_type = confirmed.message_type;
        self.is_read = confirmed.is_read;
        self.read_at = confirmed.read_at;
        if confirmed.file_url.is_some() {
            self.file_url.clone_from(&confirmed.file_url);
        }
        self.deleted_by_sender = confirmed.deleted_by_sender;
        self.deleted_by_receiver = confirmed.deleted_by_receiver;
    }
}
