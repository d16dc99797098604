//! JSON parsing for chat API responses.
//!
//! Sync functions that turn raw responses into domain types. Individual
//! messages go through `normalize_payload`; entries it rejects are skipped so
//! one bad row does not cost the whole page.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use chatsync_core::domain::{
    ConversationSummary, HistoryPage, Message, Participant, ParticipantRole, normalize_payload,
};

use crate::error::{HttpError, HttpResult};

const MESSAGE_LIST_KEYS: &[&str] = &["messages", "data", "items"];
const CONVERSATION_LIST_KEYS: &[&str] = &["conversations", "data", "items"];
const META_KEYS: &[&str] = &["meta", "pagination"];

fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| !v.is_null())
}

/// Look a field up at the top level, then inside `meta`/`pagination`.
fn lookup_with_meta<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    lookup(object, keys).or_else(|| {
        META_KEYS
            .iter()
            .filter_map(|m| object.get(*m).and_then(Value::as_object))
            .find_map(|meta| lookup(meta, keys))
    })
}

fn field<'a>(json: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    json.as_object().and_then(|o| lookup_with_meta(o, keys))
}

/// Integers given as numbers or numeric strings.
fn as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|n| u32::try_from(n).ok())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The array holding the entries: the body itself or the first list key.
fn entries<'a>(json: &'a Value, keys: &[&str]) -> HttpResult<&'a [Value]> {
    if let Some(list) = json.as_array() {
        return Ok(list);
    }
    json.as_object()
        .and_then(|o| lookup(o, keys))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| HttpError::invalid_response(format!("expected one of {keys:?}")))
}

fn normalize_entries(list: &[Value], now: DateTime<Utc>) -> Vec<Message> {
    list.iter()
        .filter_map(|raw| match normalize_payload(raw, now) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(error = %e, "Skipping malformed message in response");
                None
            }
        })
        .collect()
}

// ============================================================================
// History
// ============================================================================

/// Parse a history response for `page`.
///
/// Missing pagination fields are inferred: `current_page` defaults to the
/// requested page, and without `last_page` a full page implies another one.
pub fn parse_history_page(
    json: &Value,
    page: u32,
    page_size: u32,
    now: DateTime<Utc>,
) -> HttpResult<HistoryPage> {
    let list = entries(json, MESSAGE_LIST_KEYS)?;
    let messages = normalize_entries(list, now);

    let current_page = field(json, &["currentPage", "current_page", "page"])
        .and_then(as_u32)
        .unwrap_or(page);
    let full_page = u32::try_from(list.len()).is_ok_and(|n| n >= page_size.max(1));
    let last_page = field(json, &["lastPage", "last_page", "totalPages", "total_pages"])
        .and_then(as_u32)
        .unwrap_or(if full_page { current_page + 1 } else { current_page });
    let total = field(json, &["total", "totalCount", "total_count"])
        .and_then(as_u64)
        .unwrap_or(messages.len() as u64);

    Ok(HistoryPage {
        messages,
        total,
        current_page,
        last_page,
    })
}

// ============================================================================
// Conversations
// ============================================================================

fn parse_participant(object: &Map<String, Value>) -> Option<Participant> {
    let nested = ["participant", "user", "otherUser", "other_user"]
        .iter()
        .filter_map(|k| object.get(*k).and_then(Value::as_object))
        .next();

    let id = lookup(object, &["participantId", "participant_id", "userId", "user_id"])
        .and_then(scalar_string)
        .or_else(|| nested.and_then(|n| n.get("id")).and_then(scalar_string))
        .or_else(|| object.get("id").and_then(scalar_string))?;

    let name = lookup(object, &["participantName", "participant_name", "name"])
        .and_then(Value::as_str)
        .or_else(|| nested.and_then(|n| lookup(n, &["name", "username"])).and_then(Value::as_str))
        .filter(|n| !n.trim().is_empty())
        .map_or_else(|| id.clone(), str::to_string);

    let role = lookup(object, &["participantRole", "participant_role", "role"])
        .or_else(|| nested.and_then(|n| n.get("role")))
        .and_then(Value::as_str)
        .map_or(ParticipantRole::Unknown, ParticipantRole::parse_lossy);

    Some(Participant { id, name, role })
}

/// Parse a conversation-list response. Entries without a participant id
/// are skipped.
pub fn parse_conversations(json: &Value, now: DateTime<Utc>) -> HttpResult<Vec<ConversationSummary>> {
    let list = entries(json, CONVERSATION_LIST_KEYS)?;

    Ok(list
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|object| {
            let Some(participant) = parse_participant(object) else {
                warn!("Skipping conversation without participant id");
                return None;
            };
            let mut summary = ConversationSummary::empty(participant);
            summary.last_message = lookup(object, &["lastMessage", "last_message"])
                .and_then(|raw| normalize_payload(raw, now).ok());
            summary.unread_count = lookup(object, &["unreadCount", "unread_count", "unread"])
                .and_then(as_u32)
                .unwrap_or(0);
            Some(summary)
        })
        .collect())
}

// ============================================================================
// Send
// ============================================================================

/// Parse the server's copy of a sent message. A copy without an id cannot
/// confirm anything and is treated as invalid.
pub fn parse_sent_message(json: &Value, now: DateTime<Utc>) -> HttpResult<Message> {
    let message =
        normalize_payload(json, now).map_err(|e| HttpError::invalid_response(e.to_string()))?;
    if message.id.is_empty() {
        return Err(HttpError::invalid_response("sent message has no id"));
    }
    Ok(message)
}
