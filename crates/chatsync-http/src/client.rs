//! REST client for the marketplace chat API.

use std::sync::Arc;

use serde_json::{Value, json};
use url::Url;

use chatsync_core::domain::{ConversationFilters, ConversationSummary, HistoryPage, Message};
use chatsync_core::ports::{Clock, SystemClock};

use crate::config::RestClientConfig;
use crate::error::HttpResult;
use crate::http::{HttpBackend, ReqwestBackend};
use crate::parsing::{parse_conversations, parse_history_page, parse_sent_message};
use crate::url::{build_conversations_url, build_history_url, build_send_url};

/// Default client using the reqwest backend.
pub type DefaultRestClient = RestClient<ReqwestBackend>;

/// Client for the chat REST API.
///
/// Generic over the HTTP backend so tests can inject canned responses. Use
/// [`DefaultRestClient`] in production and interact with it through the
/// `chatsync-core` ports.
pub struct RestClient<B: HttpBackend> {
    pub(crate) backend: B,
    pub(crate) base_url: Url,
    pub(crate) clock: Arc<dyn Clock>,
}

impl DefaultRestClient {
    pub fn new(config: &RestClientConfig) -> HttpResult<Self> {
        let resolved = config.resolve()?;
        let backend = ReqwestBackend::new(&resolved)?;
        Ok(Self {
            backend,
            base_url: resolved.base_url,
            clock: Arc::new(SystemClock),
        })
    }
}

impl<B: HttpBackend> RestClient<B> {
    /// Client over a custom backend.
    pub fn with_backend(base_url: Url, backend: B) -> Self {
        Self {
            backend,
            base_url,
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used for messages the server returns without a timestamp.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) async fn history_page(
        &self,
        participant_id: &str,
        page: u32,
        page_size: u32,
    ) -> HttpResult<HistoryPage> {
        let url = build_history_url(&self.base_url, participant_id, page, page_size);
        let json = self.backend.get_json(&url).await?;
        parse_history_page(&json, page, page_size, self.clock.now())
    }

    pub(crate) async fn conversations(
        &self,
        filters: &ConversationFilters,
    ) -> HttpResult<Vec<ConversationSummary>> {
        let url = build_conversations_url(&self.base_url, filters);
        let json = self.backend.get_json(&url).await?;
        parse_conversations(&json, self.clock.now())
    }

    pub(crate) async fn send(&self, from_id: &str, to_id: &str, body: &str) -> HttpResult<Message> {
        let url = build_send_url(&self.base_url);
        let json = self
            .backend
            .post_json(&url, &send_body(from_id, to_id, body))
            .await?;
        parse_sent_message(&json, self.clock.now())
    }
}

fn send_body(from_id: &str, to_id: &str, body: &str) -> Value {
    json!({
        "fromId": from_id,
        "toId": to_id,
        "body": body,
        "messageType": "TEXT",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{CannedResponse, FakeBackend};

    #[test]
    fn test_default_client_creation() {
        assert!(DefaultRestClient::new(&RestClientConfig::new()).is_ok());
        assert!(
            DefaultRestClient::new(&RestClientConfig::new().with_base_url("::nope")).is_err()
        );
    }

    #[tokio::test]
    async fn test_send_posts_camel_case_body() {
        let backend = FakeBackend::new().with_response(
            "/messages",
            CannedResponse::Json(json!({"id": 5, "fromId": "me", "toId": "p", "body": "hi"})),
        );
        let base = Url::parse("https://market.example.com/api").unwrap();
        let client = RestClient::with_backend(base, backend);

        let sent = client.send("me", "p", "hi").await.unwrap();
        assert_eq!(sent.id, "5");

        let requests = client.backend.requests();
        let (url, body) = &requests[0];
        assert_eq!(url, "https://market.example.com/api/messages");
        assert_eq!(body.as_ref().unwrap()["toId"], "p");
        assert_eq!(body.as_ref().unwrap()["messageType"], "TEXT");
    }
}
