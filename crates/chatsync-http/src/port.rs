//! Port trait implementations for `RestClient`.
//!
//! Implements the core-owned history, conversation-list and fallback-send
//! ports, mapping internal `HttpError`s to each port's error type.

use async_trait::async_trait;

use chatsync_core::domain::{ConversationFilters, ConversationSummary, HistoryPage, Message};
use chatsync_core::ports::{
    ConversationListError, ConversationListPort, FallbackSendPort, HistoryError, HistoryPort,
    TransportError,
};

use crate::client::RestClient;
use crate::error::HttpError;
use crate::http::HttpBackend;

// ============================================================================
// Error Mapping
// ============================================================================

fn map_history_error(err: HttpError) -> HistoryError {
    match err {
        e if e.is_auth_failure() => HistoryError::Unauthorized,
        HttpError::ApiRequestFailed { status: 404, url } => HistoryError::NotFound(url),
        HttpError::InvalidResponse { message } => HistoryError::InvalidResponse(message),
        HttpError::JsonParse(e) => HistoryError::InvalidResponse(e.to_string()),
        other => HistoryError::Request(other.to_string()),
    }
}

fn map_list_error(err: HttpError) -> ConversationListError {
    match err {
        e if e.is_auth_failure() => ConversationListError::Unauthorized,
        HttpError::InvalidResponse { message } => ConversationListError::InvalidResponse(message),
        HttpError::JsonParse(e) => ConversationListError::InvalidResponse(e.to_string()),
        other => ConversationListError::Request(other.to_string()),
    }
}

/// 4xx other than auth means the server refused this message; everything
/// else is a failed delivery attempt.
fn map_send_error(err: HttpError) -> TransportError {
    match err.status() {
        Some(401 | 403) => TransportError::Unauthorized,
        Some(status) if (400..500).contains(&status) => TransportError::Rejected(err.to_string()),
        _ => TransportError::Fallback(err.to_string()),
    }
}

// ============================================================================
// Port Implementations
// ============================================================================

#[async_trait]
impl<B: HttpBackend> HistoryPort for RestClient<B> {
    async fn fetch_page(
        &self,
        participant_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, HistoryError> {
        self.history_page(participant_id, page, page_size)
            .await
            .map_err(map_history_error)
    }
}

#[async_trait]
impl<B: HttpBackend> ConversationListPort for RestClient<B> {
    async fn fetch(
        &self,
        filters: &ConversationFilters,
    ) -> Result<Vec<ConversationSummary>, ConversationListError> {
        self.conversations(filters).await.map_err(map_list_error)
    }
}

#[async_trait]
impl<B: HttpBackend> FallbackSendPort for RestClient<B> {
    async fn send_fallback_rest(
        &self,
        from_id: &str,
        to_id: &str,
        body: &str,
    ) -> Result<Message, TransportError> {
        self.send(from_id, to_id, body).await.map_err(map_send_error)
    }
}
