//! Session scripts for `chatsync replay`.
//!
//! A script seeds the in-memory ports (conversation list and per-participant
//! history) and then lists the steps to drive through the engine.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use chatsync_core::{ConversationFilters, Participant, ParticipantRole, SyncSettings};

use crate::error::CliError;

/// Start time used when a script does not set `startAt`.
pub const DEFAULT_START_MS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Script {
    #[serde(default = "default_user")]
    pub user: String,

    pub start_at: Option<DateTime<Utc>>,

    /// Overrides the environment-derived engine settings.
    pub settings: Option<SyncSettings>,

    #[serde(default)]
    pub summaries: Vec<ScriptParticipant>,

    /// Raw history payloads per participant, in any order.
    #[serde(default)]
    pub history: BTreeMap<String, Vec<Value>>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_user() -> String {
    "me".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptParticipant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl ScriptParticipant {
    pub fn to_participant(&self) -> Participant {
        let role = self
            .role
            .as_deref()
            .map_or(ParticipantRole::Unknown, ParticipantRole::parse_lossy);
        match &self.name {
            Some(name) => Participant::new(&self.id, name, role),
            None => Participant {
                role,
                ..Participant::unnamed(&self.id)
            },
        }
    }
}

/// One scripted action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Select { participant: String },
    LoadOlder,
    Send { body: String },
    /// Deliver a raw payload as if it came from the socket.
    Live { payload: Value },
    /// Echo the most recent transport send back with a server id.
    Echo { id: String },
    Advance { ms: i64 },
    Sweep,
    Connect { connected: bool },
    /// Make the REST fallback fail (or recover with `reason: null`).
    FailFallback { reason: Option<String> },
    /// Retry the most recent FAILED message in the active conversation.
    Retry,
    /// Discard the most recent FAILED message in the active conversation.
    Discard,
    Refresh {
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        search: Option<String>,
        #[serde(default, rename = "unreadOnly")]
        unread_only: bool,
    },
    Close { participant: String },
}

impl Step {
    /// Name used in the replay report.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::LoadOlder => "load_older",
            Self::Send { .. } => "send",
            Self::Live { .. } => "live",
            Self::Echo { .. } => "echo",
            Self::Advance { .. } => "advance",
            Self::Sweep => "sweep",
            Self::Connect { .. } => "connect",
            Self::FailFallback { .. } => "fail_fallback",
            Self::Retry => "retry",
            Self::Discard => "discard",
            Self::Refresh { .. } => "refresh",
            Self::Close { .. } => "close",
        }
    }
}

/// Filters for a `refresh` step.
pub fn refresh_filters(
    role: Option<&str>,
    search: Option<&str>,
    unread_only: bool,
) -> ConversationFilters {
    ConversationFilters {
        role: role.map(ParticipantRole::parse_lossy),
        search: search.map(str::to_string),
        unread_only,
    }
}

impl Script {
    pub fn parse(json: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, CliError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?;
        Self::parse(&json)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start_at.unwrap_or_else(|| {
            Utc.timestamp_millis_opt(DEFAULT_START_MS)
                .single()
                .unwrap_or_default()
        })
    }
}
