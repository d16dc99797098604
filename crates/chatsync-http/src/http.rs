//! HTTP backend abstraction for the chat REST API.
//!
//! The client talks to a trait so tests can inject canned responses. The
//! production implementation uses reqwest with retry logic for transient
//! errors.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::config::ResolvedConfig;
use crate::error::{HttpError, HttpResult};

// ============================================================================
// HTTP Backend Trait
// ============================================================================

/// Fetches and posts JSON.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn get_json(&self, url: &Url) -> HttpResult<Value>;

    async fn post_json(&self, url: &Url, body: &Value) -> HttpResult<Value>;
}

// ============================================================================
// Reqwest Backend
// ============================================================================

/// Production backend using reqwest.
///
/// GET requests are retried with exponential backoff on server errors (5xx)
/// and network errors. POST requests are sent once.
pub struct ReqwestBackend {
    client: reqwest::Client,
    max_retries: u8,
    retry_base_delay_ms: u64,
    auth_token: Option<String>,
}

impl ReqwestBackend {
    pub(crate) fn new(config: &ResolvedConfig) -> HttpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
            auth_token: config.token.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn backoff(&self, attempt: u8) -> Duration {
        let factor = 2u64.saturating_pow(u32::from(attempt.saturating_sub(1)));
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }

    /// GET a URL with automatic retry for transient errors.
    async fn fetch_with_retry(&self, url: &Url) -> HttpResult<reqwest::Response> {
        let mut last_error: Option<HttpError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.backoff(attempt)).await;
            }

            match self.authorize(self.client.get(url.as_str())).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    // 5xx errors are retryable (server-side issues)
                    if status.is_server_error() && attempt < self.max_retries {
                        last_error = Some(HttpError::ApiRequestFailed {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        continue;
                    }

                    // 4xx errors or final attempt - fail immediately
                    return Err(HttpError::ApiRequestFailed {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    // Network errors are retryable
                    if attempt < self.max_retries {
                        last_error = Some(e.into());
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error.unwrap_or_else(|| HttpError::invalid_response("Unknown error during fetch")))
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn get_json(&self, url: &Url) -> HttpResult<Value> {
        let response = self.fetch_with_retry(url).await?;
        Ok(response.json().await?)
    }

    async fn post_json(&self, url: &Url, body: &Value) -> HttpResult<Value> {
        let response = self
            .authorize(self.client.post(url.as_str()))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::ApiRequestFailed {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

// ============================================================================
// Fake Backend for Testing
// ============================================================================
