//! Internal error types for REST operations.
//!
//! These errors are internal to `chatsync-http` and are mapped to core port
//! errors at the boundary (see `port.rs`).

use thiserror::Error;

pub type HttpResult<T> = Result<T, HttpError>;

/// Errors related to REST API operations.
#[derive(Debug, Error)]
pub enum HttpError {
    /// API request failed with an HTTP error status.
    #[error("API request failed with status {status}: {url}")]
    ApiRequestFailed { status: u16, url: String },

    /// API returned an invalid or unexpected response.
    #[error("Invalid response from API: {message}")]
    InvalidResponse { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl HttpError {
    pub(crate) fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// HTTP status, if the server answered.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::ApiRequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 or 403.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_request_failed_error_message() {
        let error = HttpError::ApiRequestFailed {
            status: 502,
            url: "https://market.example.com/api/messages/7".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("/messages/7"));
        assert_eq!(error.status(), Some(502));
        assert!(!error.is_auth_failure());
    }

    #[test]
    fn test_auth_failure() {
        let error = HttpError::ApiRequestFailed {
            status: 403,
            url: String::new(),
        };
        assert!(error.is_auth_failure());
        assert!(!HttpError::invalid_response("x").is_auth_failure());
    }
}
