//! Pagination types for the history API.

use serde::{Deserialize, Serialize};

use super::message::Message;

/// One page returned by the history API. Message order is not assumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub total: u64,
    pub current_page: u32,
    pub last_page: u32,
}

impl HistoryPage {
    /// Whether the server reports pages beyond this one.
    ///
    /// An empty page ends pagination even if the counters disagree.
    #[must_use]
    pub fn has_more(&self) -> bool {
        !self.messages.is_empty() && self.current_page < self.last_page
    }
}

/// Cursor for the active conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCursor {
    /// Last page successfully merged (1 before anything is loaded).
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_known: Option<u64>,
}

impl PageCursor {
    /// Cursor state on conversation activation.
    #[must_use]
    pub const fn initial(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size,
            has_more: true,
            total_known: None,
        }
    }
}

/// Pagination lifecycle for the active conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaginationState {
    #[default]
    Idle,
    LoadingInitial,
    Ready,
    LoadingMore,
    /// All pages merged.
    Exhausted,
}

impl PaginationState {
    /// Whether a request is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::LoadingInitial | Self::LoadingMore)
    }
}
