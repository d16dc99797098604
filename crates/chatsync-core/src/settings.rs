//! Sync engine settings and validation.
//!
//! Every field is optional so a partially specified file or environment still
//! yields a working configuration; the `effective_*` accessors apply the
//! defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of messages per history page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default window inside which equal content counts as the same message.
pub const DEFAULT_RECONCILE_WINDOW_MS: u64 = 3_000;

/// Default bucket width for `MessageKey` timestamps.
pub const DEFAULT_DEDUP_BUCKET_SECS: u32 = 3;

/// Default time a send may stay PENDING before it is marked FAILED.
pub const DEFAULT_PENDING_TIMEOUT_MS: u64 = 10_000;

/// Default period of the pending-timeout watchdog.
pub const DEFAULT_TIMEOUT_SWEEP_INTERVAL_MS: u64 = 1_000;

/// Default window in which an identical pending send is rejected.
pub const DEFAULT_SEND_DEBOUNCE_MS: u64 = 500;

/// Default number of content keys tracked per conversation.
pub const DEFAULT_MAX_TRACKED_KEYS: usize = 256;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CHATSYNC_";

/// Sync engine settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    /// Messages requested per history page (1-200).
    pub page_size: Option<u32>,

    /// Content-match window for dedup and echo reconciliation.
    pub reconcile_window_ms: Option<u64>,

    /// Bucket width for message keys, in seconds.
    pub dedup_bucket_secs: Option<u32>,

    /// Time before an unconfirmed send is marked FAILED.
    pub pending_timeout_ms: Option<u64>,

    /// Watchdog period.
    pub timeout_sweep_interval_ms: Option<u64>,

    /// Identical sends within this window are rejected while pending.
    pub send_debounce_ms: Option<u64>,

    /// LRU bound of the per-conversation dedup map.
    pub max_tracked_keys: Option<usize>,
}

impl SyncSettings {
    /// Create settings with every field set to its default.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE),
            reconcile_window_ms: Some(DEFAULT_RECONCILE_WINDOW_MS),
            dedup_bucket_secs: Some(DEFAULT_DEDUP_BUCKET_SECS),
            pending_timeout_ms: Some(DEFAULT_PENDING_TIMEOUT_MS),
            timeout_sweep_interval_ms: Some(DEFAULT_TIMEOUT_SWEEP_INTERVAL_MS),
            send_debounce_ms: Some(DEFAULT_SEND_DEBOUNCE_MS),
            max_tracked_keys: Some(DEFAULT_MAX_TRACKED_KEYS),
        }
    }

    #[must_use]
    pub const fn effective_page_size(&self) -> u32 {
        match self.page_size {
            Some(size) => size,
            None => DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub const fn effective_dedup_bucket_secs(&self) -> u32 {
        match self.dedup_bucket_secs {
            Some(secs) => secs,
            None => DEFAULT_DEDUP_BUCKET_SECS,
        }
    }

    #[must_use]
    pub const fn effective_max_tracked_keys(&self) -> usize {
        match self.max_tracked_keys {
            Some(n) => n,
            None => DEFAULT_MAX_TRACKED_KEYS,
        }
    }

    /// Content-match window as a signed duration for timestamp arithmetic.
    #[must_use]
    pub fn reconcile_window(&self) -> chrono::Duration {
        millis(self.reconcile_window_ms.unwrap_or(DEFAULT_RECONCILE_WINDOW_MS))
    }

    #[must_use]
    pub fn pending_timeout(&self) -> chrono::Duration {
        millis(self.pending_timeout_ms.unwrap_or(DEFAULT_PENDING_TIMEOUT_MS))
    }

    #[must_use]
    pub fn send_debounce(&self) -> chrono::Duration {
        millis(self.send_debounce_ms.unwrap_or(DEFAULT_SEND_DEBOUNCE_MS))
    }

    /// Watchdog period for `tokio::time::interval`.
    #[must_use]
    pub fn timeout_sweep_interval(&self) -> Duration {
        Duration::from_millis(
            self.timeout_sweep_interval_ms
                .unwrap_or(DEFAULT_TIMEOUT_SWEEP_INTERVAL_MS),
        )
    }

    /// Merge an update into this one, only touching fields that are `Some`.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(size) = other.page_size {
            self.page_size = size;
        }
        if let Some(window) = other.reconcile_window_ms {
            self.reconcile_window_ms = window;
        }
        if let Some(secs) = other.dedup_bucket_secs {
            self.dedup_bucket_secs = secs;
        }
        if let Some(timeout) = other.pending_timeout_ms {
            self.pending_timeout_ms = timeout;
        }
        if let Some(interval) = other.timeout_sweep_interval_ms {
            self.timeout_sweep_interval_ms = interval;
        }
        if let Some(debounce) = other.send_debounce_ms {
            self.send_debounce_ms = debounce;
        }
        if let Some(n) = other.max_tracked_keys {
            self.max_tracked_keys = n;
        }
    }

    /// Defaults overridden by `CHATSYNC_*` environment variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `CHATSYNC_*` key. The result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::with_defaults();
        let update = SettingsUpdate {
            page_size: parse_env(&lookup, "PAGE_SIZE")?.map(Some),
            reconcile_window_ms: parse_env(&lookup, "RECONCILE_WINDOW_MS")?.map(Some),
            dedup_bucket_secs: parse_env(&lookup, "DEDUP_BUCKET_SECS")?.map(Some),
            pending_timeout_ms: parse_env(&lookup, "PENDING_TIMEOUT_MS")?.map(Some),
            timeout_sweep_interval_ms: parse_env(&lookup, "TIMEOUT_SWEEP_INTERVAL_MS")?.map(Some),
            send_debounce_ms: parse_env(&lookup, "SEND_DEBOUNCE_MS")?.map(Some),
            max_tracked_keys: parse_env(&lookup, "MAX_TRACKED_KEYS")?.map(Some),
        };
        settings.merge(&update);
        validate_settings(&settings)?;
        Ok(settings)
    }
}

fn millis(ms: u64) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

fn parse_env<F, T>(lookup: &F, suffix: &str) -> Result<Option<T>, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let key = format!("{ENV_PREFIX}{suffix}");
    match lookup(&key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SettingsError::InvalidEnv { key, value: raw }),
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = reset the field to its default
/// - `Some(Some(value))` = set the field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub page_size: Option<Option<u32>>,
    pub reconcile_window_ms: Option<Option<u64>>,
    pub dedup_bucket_secs: Option<Option<u32>>,
    pub pending_timeout_ms: Option<Option<u64>>,
    pub timeout_sweep_interval_ms: Option<Option<u64>>,
    pub send_debounce_ms: Option<Option<u64>>,
    pub max_tracked_keys: Option<Option<usize>>,
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Page size must be between 1 and 200, got {0}")]
    InvalidPageSize(u32),

    #[error("Dedup bucket must be between 1 and 60 seconds, got {0}")]
    InvalidBucket(u32),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("Max tracked keys must be at least 1")]
    InvalidTrackedKeys,

    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
}

/// Validate settings values.
pub fn validate_settings(settings: &SyncSettings) -> Result<(), SettingsError> {
    if let Some(size) = settings.page_size {
        if !(1..=200).contains(&size) {
            return Err(SettingsError::InvalidPageSize(size));
        }
    }

    if let Some(secs) = settings.dedup_bucket_secs {
        if !(1..=60).contains(&secs) {
            return Err(SettingsError::InvalidBucket(secs));
        }
    }

    let durations = [
        ("reconcile_window_ms", settings.reconcile_window_ms),
        ("pending_timeout_ms", settings.pending_timeout_ms),
        ("timeout_sweep_interval_ms", settings.timeout_sweep_interval_ms),
    ];
    for (field, value) in durations {
        if value == Some(0) {
            return Err(SettingsError::ZeroDuration { field });
        }
    }

    if settings.max_tracked_keys == Some(0) {
        return Err(SettingsError::InvalidTrackedKeys);
    }

    Ok(())
}
