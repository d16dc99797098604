//! Conversation list port definition.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ConversationFilters, ConversationSummary};

/// Errors that can occur while fetching the conversation list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationListError {
    #[error("Conversation list request failed: {0}")]
    Request(String),

    #[error("Invalid conversation list response: {0}")]
    InvalidResponse(String),

    #[error("Not authorized to list conversations")]
    Unauthorized,
}

/// Port for fetching conversation summaries for the current user.
#[async_trait]
pub trait ConversationListPort: Send + Sync {
    async fn fetch(
        &self,
        filters: &ConversationFilters,
    ) -> Result<Vec<ConversationSummary>, ConversationListError>;
}
