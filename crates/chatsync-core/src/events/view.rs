//! View state published to the UI after every mutation.

use serde::{Deserialize, Serialize};

use crate::domain::{ConversationSummary, Message, PageCursor, PaginationState};

/// Pagination as the UI sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationView {
    pub state: PaginationState,
    pub page: u32,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_known: Option<u64>,
}

impl PaginationView {
    #[must_use]
    pub const fn new(state: PaginationState, cursor: &PageCursor) -> Self {
        Self {
            state,
            page: cursor.page,
            has_more: cursor.has_more,
            total_known: cursor.total_known,
        }
    }

    /// Whether a "load older" affordance should be offered.
    #[must_use]
    pub const fn can_load_older(&self) -> bool {
        matches!(self.state, PaginationState::Ready) && self.has_more
    }
}

/// Read-only snapshot of everything the chat screens render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub active_participant: Option<String>,
    /// Active conversation, oldest first.
    pub messages: Vec<Message>,
    pub pagination: PaginationView,
    /// Most recent activity first.
    pub summaries: Vec<ConversationSummary>,
    pub last_error: Option<String>,
}

impl ViewState {
    /// Total unread across all conversations.
    #[must_use]
    pub fn total_unread(&self) -> u32 {
        self.summaries
            .iter()
            .map(|s| s.unread_count)
            .fold(0, u32::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Participant;

    #[test]
    fn test_can_load_older() {
        let cursor = PageCursor::initial(20);
        assert!(PaginationView::new(PaginationState::Ready, &cursor).can_load_older());
        assert!(!PaginationView::new(PaginationState::LoadingMore, &cursor).can_load_older());

        let done = PageCursor {
            has_more: false,
            ..cursor
        };
        assert!(!PaginationView::new(PaginationState::Ready, &done).can_load_older());
    }

    #[test]
    fn test_total_unread_saturates() {
        let unread = |id: &str, count: u32| ConversationSummary {
            unread_count: count,
            ..ConversationSummary::empty(Participant::unnamed(id))
        };
        let view = ViewState {
            summaries: vec![unread("a", u32::MAX), unread("b", 3), unread("c", 0)],
            ..ViewState::default()
        };
        assert_eq!(view.total_unread(), u32::MAX);
        assert_eq!(ViewState::default().total_unread(), 0);
    }
}
