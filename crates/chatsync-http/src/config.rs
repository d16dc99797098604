//! Public configuration for the REST client.
//!
//! The internal config, with a parsed base URL, is derived from this.

use std::time::Duration;

use url::Url;

use crate::error::HttpResult;

/// Configuration for the REST client.
///
/// # Example
///
/// ```
/// use chatsync_http::RestClientConfig;
/// use std::time::Duration;
///
/// let config = RestClientConfig::new()
///     .with_base_url("https://market.example.com/api")
///     .with_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Base URL; endpoint paths are appended to it
    pub(crate) base_url: String,
    pub(crate) user_agent: String,
    pub(crate) timeout: Duration,
    /// Optional bearer token
    pub(crate) token: Option<String>,
    /// Maximum number of retry attempts for transient errors
    pub(crate) max_retries: u8,
    /// Base delay for exponential backoff
    pub(crate) retry_base_delay: Duration,
}

impl Default for RestClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            user_agent: concat!("chatsync-http/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(15),
            token: None,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl RestClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL.
    ///
    /// Defaults to `http://localhost:8000/api`.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    ///
    /// Defaults to 15 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_optional_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the maximum number of retry attempts for GET requests.
    ///
    /// Defaults to 3 retries.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the base delay for exponential backoff retries.
    ///
    /// Defaults to 500ms.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub(crate) fn resolve(&self) -> HttpResult<ResolvedConfig> {
        Ok(ResolvedConfig {
            base_url: Url::parse(&self.base_url)?,
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
            token: self.token.clone(),
            max_retries: self.max_retries,
            retry_base_delay_ms: u64::try_from(self.retry_base_delay.as_millis())
                .unwrap_or(u64::MAX),
        })
    }
}

/// Validated configuration used by the client and backend.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub base_url: Url,
    pub user_agent: String,
    pub timeout: Duration,
    pub token: Option<String>,
    pub max_retries: u8,
    pub retry_base_delay_ms: u64,
}

#[cfg(test)]
impl Default for ResolvedConfig {
    fn default() -> Self {
        RestClientConfig::default()
            .resolve()
            .unwrap_or_else(|e| panic!("default config must resolve: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;

    #[test]
    fn test_default_config() {
        let config = RestClientConfig::new();
        assert_eq!(config.base_url, "http://localhost:8000/api");
        assert!(config.user_agent.contains("chatsync-http"));
        assert!(config.token.is_none());
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_builder_pattern() {
        let config = RestClientConfig::new()
            .with_base_url("https://market.example.com/api/v2")
            .with_timeout(Duration::from_secs(5))
            .with_token("secret")
            .with_max_retries(1)
            .with_retry_delay(Duration::from_millis(20));

        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.base_url.path(), "/api/v2");
        assert_eq!(resolved.timeout, Duration::from_secs(5));
        assert_eq!(resolved.token.as_deref(), Some("secret"));
        assert_eq!(resolved.max_retries, 1);
        assert_eq!(resolved.retry_base_delay_ms, 20);
    }

    #[test]
    fn test_invalid_base_url_is_an_error() {
        let result = RestClientConfig::new().with_base_url("not a url").resolve();
        assert!(matches!(result, Err(HttpError::InvalidUrl(_))));
    }

    #[test]
    fn test_optional_token() {
        let with_token = RestClientConfig::new().with_optional_token(Some("t".to_string()));
        assert_eq!(with_token.token.as_deref(), Some("t"));
        assert!(RestClientConfig::new().with_optional_token(None).token.is_none());
    }
}
