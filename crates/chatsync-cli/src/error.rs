//! CLI-specific error types and mappings.
//!
//! Maps engine, settings and HTTP errors to exit codes and user-facing
//! messages.

use chatsync_core::{SendError, SettingsError, SyncError};
use chatsync_http::HttpError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine or port failure.
    #[error("{0}")]
    Sync(String),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session script could not be parsed.
    #[error("Invalid script: {0}")]
    Script(String),

    /// The backend could not be reached or refused the request.
    #[error("Service error: {0}")]
    Service(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where one fits.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Sync(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::Script(_) => 65,   // EX_DATAERR
            Self::Service(_) => 69,  // EX_UNAVAILABLE
            Self::Io(_) => 74,       // EX_IOERR
            Self::Config(_) => 78,   // EX_CONFIG
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Settings(e) => Self::Config(e.to_string()),
            SyncError::NoActiveConversation => Self::Arguments(err.to_string()),
            other => Self::Sync(other.to_string()),
        }
    }
}

impl From<SendError> for CliError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::EmptyBody => Self::Arguments(err.to_string()),
            other => Self::Sync(other.to_string()),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<HttpError> for CliError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::InvalidUrl(e) => Self::Config(format!("base URL: {e}")),
            other => Self::Service(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Script(err.to_string())
    }
}
