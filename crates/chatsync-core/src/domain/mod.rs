//! Core domain types.
//!
//! These types model the conversation data the sync engine works on,
//! independent of any transport or storage concern.
//!
//! # Structure
//!
//! - `message` - `Message`, message type and delivery state
//! - `conversation` - participants and conversation summaries
//! - `pagination` - history pages and the page cursor
//! - `key` - content-derived message identity
//! - `normalize` - loosely typed payload to `Message` conversion

pub mod conversation;
pub mod key;
pub mod message;
pub mod normalize;
pub mod pagination;

pub use conversation::{ConversationFilters, ConversationSummary, Participant, ParticipantRole};
pub use key::{ContentKey, MessageKey, identify, normalize_body};
pub use message::{
    DeliveryState, Message, MessageType, PROVISIONAL_ID_PREFIX, is_provisional_id, provisional_id,
};
pub use normalize::{NormalizeError, normalize_payload, parse_timestamp};
pub use pagination::{HistoryPage, PageCursor, PaginationState};
