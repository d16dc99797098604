//! History port definition.
//!
//! The paginated REST history API, seen from the engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::HistoryPage;

/// Errors that can occur while fetching message history.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("History request failed: {0}")]
    Request(String),

    #[error("Invalid history response: {0}")]
    InvalidResponse(String),

    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Not authorized to read history")]
    Unauthorized,
}

/// Port for fetching one page of a conversation's history.
///
/// Pages are 1-based. Implementations make no ordering promise for the
/// returned messages.
#[async_trait]
pub trait HistoryPort: Send + Sync {
    async fn fetch_page(
        &self,
        participant_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, HistoryError>;
}
