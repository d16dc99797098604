//! Normalization of loosely typed message payloads.
//!
//! Live-channel and REST payloads spell the same fields several ways
//! (`fromId`, `fromUserId`, `from.id`, ...). This is the only place that
//! tolerates that: everything past this boundary works with a typed
//! [`Message`] or never sees the payload at all.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use super::message::{DeliveryState, Message, MessageType};

const ENVELOPE_KEYS: &[&str] = &["message", "data", "payload"];
const ID_KEYS: &[&str] = &["id", "messageId", "message_id", "_id"];
const FROM_KEYS: &[&str] = &["fromId", "fromUserId", "from_id", "senderId", "sender_id"];
const FROM_OBJECT_KEYS: &[&str] = &["from", "sender"];
const TO_KEYS: &[&str] = &["toId", "toUserId", "to_id", "receiverId", "receiver_id"];
const TO_OBJECT_KEYS: &[&str] = &["to", "receiver"];
const BODY_KEYS: &[&str] = &["body", "message", "content", "text"];
const TYPE_KEYS: &[&str] = &["messageType", "message_type"];
const CREATED_KEYS: &[&str] = &["createdAt", "created_at", "timestamp"];
const READ_AT_KEYS: &[&str] = &["readAt", "read_at"];
const FILE_URL_KEYS: &[&str] = &["fileUrl", "file_url", "fileURL"];

/// Why a payload could not become a [`Message`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Message body is empty")]
    EmptyBody,

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Turn a raw payload into a confirmed [`Message`].
///
/// Missing `messageType` defaults to TEXT and missing `createdAt` to `now`.
/// Missing sender, recipient or body is a rejection.
pub fn normalize_payload(raw: &Value, now: DateTime<Utc>) -> Result<Message, NormalizeError> {
    let object = unwrap_envelope(raw)
        .as_object()
        .ok_or(NormalizeError::NotAnObject)?;

    let from_id = participant_field(object, FROM_KEYS, FROM_OBJECT_KEYS)
        .ok_or(NormalizeError::MissingField("fromId"))?;
    let to_id = participant_field(object, TO_KEYS, TO_OBJECT_KEYS)
        .ok_or(NormalizeError::MissingField("toId"))?;

    let message_type =
        string_field(object, TYPE_KEYS).map_or(MessageType::Text, |t| MessageType::parse_lossy(&t));
    let file_url = string_field(object, FILE_URL_KEYS).filter(|u| !u.is_empty());

    let body = match string_field(object, BODY_KEYS) {
        Some(body) => body,
        None if file_url.is_some() => String::new(),
        None => return Err(NormalizeError::MissingField("body")),
    };
    if body.trim().is_empty() && file_url.is_none() {
        return Err(NormalizeError::EmptyBody);
    }

    let created_at = match first(object, CREATED_KEYS) {
        Some(value) => parse_timestamp(value)?,
        None => now,
    };
    let read_at = first(object, READ_AT_KEYS).and_then(|v| parse_timestamp(v).ok());

    Ok(Message {
        id: scalar_field(object, ID_KEYS).unwrap_or_default(),
        from_id,
        to_id,
        body,
        message_type,
        created_at,
        delivery_state: DeliveryState::Confirmed,
        is_read: bool_field(object, &["isRead", "is_read"]) || read_at.is_some(),
        read_at,
        file_url,
        deleted_by_sender: bool_field(object, &["deletedBySender", "deleted_by_sender"]),
        deleted_by_receiver: bool_field(object, &["deletedByReceiver", "deleted_by_receiver"]),
    })
}

/// Parse a timestamp given as RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), or
/// epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, NormalizeError> {
    match value {
        Value::String(s) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Ok(parsed.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .map_err(|_| NormalizeError::InvalidTimestamp(s.clone()))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| NormalizeError::InvalidTimestamp(n.to_string())),
        other => Err(NormalizeError::InvalidTimestamp(other.to_string())),
    }
}

/// Descend into `{"message": {...}}`-style wrappers.
fn unwrap_envelope(raw: &Value) -> &Value {
    let mut current = raw;
    while let Some(inner) = current
        .as_object()
        .and_then(|o| ENVELOPE_KEYS.iter().find_map(|k| o.get(*k)))
        .filter(|v| v.is_object())
    {
        current = inner;
    }
    current
}

fn first<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| !v.is_null())
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find_map(|v| v.as_str().map(str::to_string))
}

/// Strings or numbers, rendered as a non-empty string.
fn scalar_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find_map(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn participant_field(
    object: &Map<String, Value>,
    direct_keys: &[&str],
    object_keys: &[&str],
) -> Option<String> {
    scalar_field(object, direct_keys).or_else(|| {
        object_keys
            .iter()
            .filter_map(|k| object.get(*k).and_then(Value::as_object))
            .find_map(|nested| nested.get("id").and_then(scalar_to_string))
    })
}

fn bool_field(object: &Map<String, Value>, keys: &[&str]) -> bool {
    first(object, keys).is_some_and(|v| match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_canonical_payload() {
        let raw = json!({
            "id": "srv-1",
            "fromId": "p1",
            "toId": "me",
            "body": "hello",
            "messageType": "TEXT",
            "createdAt": "2024-05-01T10:00:00Z"
        });
        let msg = normalize_payload(&raw, now()).unwrap();
        assert_eq!(msg.id, "srv-1");
        assert_eq!(msg.from_id, "p1");
        assert_eq!(msg.to_id, "me");
        assert_eq!(msg.body, "hello");
        assert_eq!(msg.delivery_state, DeliveryState::Confirmed);
        assert_eq!(msg.created_at, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_field_fallbacks() {
        let raw = json!({
            "message_id": 42,
            "fromUserId": 7,
            "receiver": { "id": "me" },
            "content": "numbers as ids"
        });
        let msg = normalize_payload(&raw, now()).unwrap();
        assert_eq!(msg.id, "42");
        assert_eq!(msg.from_id, "7");
        assert_eq!(msg.to_id, "me");
        assert_eq!(msg.body, "numbers as ids");
    }

    #[test]
    fn test_nested_from_object() {
        let raw = json!({ "from": { "id": "p1", "name": "Shop" }, "toId": "me", "text": "hi" });
        let msg = normalize_payload(&raw, now()).unwrap();
        assert_eq!(msg.from_id, "p1");
    }

    #[test]
    fn test_defaults_applied() {
        let raw = json!({ "fromId": "p1", "toId": "me", "body": "hi" });
        let msg = normalize_payload(&raw, now()).unwrap();
        assert_eq!(msg.message_type, MessageType::Text);
        assert_eq!(msg.created_at, now());
        assert!(msg.id.is_empty());
    }

    #[test]
    fn test_envelope_unwrapped() {
        let raw = json!({
            "event": "message.sent",
            "data": { "message": { "id": "9", "fromId": "p1", "toId": "me", "body": "wrapped" } }
        });
        let msg = normalize_payload(&raw, now()).unwrap();
        assert_eq!(msg.id, "9");
        assert_eq!(msg.body, "wrapped");
    }

    #[test]
    fn test_string_message_field_is_body_not_envelope() {
        let raw = json!({ "fromId": "p1", "toId": "me", "message": "plain" });
        let msg = normalize_payload(&raw, now()).unwrap();
        assert_eq!(msg.body, "plain");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            normalize_payload(&json!("text"), now()),
            Err(NormalizeError::NotAnObject)
        );
        assert_eq!(
            normalize_payload(&json!({ "toId": "me", "body": "x" }), now()),
            Err(NormalizeError::MissingField("fromId"))
        );
        assert_eq!(
            normalize_payload(&json!({ "fromId": "p1", "body": "x" }), now()),
            Err(NormalizeError::MissingField("toId"))
        );
        assert_eq!(
            normalize_payload(&json!({ "fromId": "p1", "toId": "me" }), now()),
            Err(NormalizeError::MissingField("body"))
        );
        assert_eq!(
            normalize_payload(&json!({ "fromId": "p1", "toId": "me", "body": "  " }), now()),
            Err(NormalizeError::EmptyBody)
        );
        assert!(matches!(
            normalize_payload(
                &json!({ "fromId": "p1", "toId": "me", "body": "x", "createdAt": "yesterday" }),
                now()
            ),
            Err(NormalizeError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_file_message_without_body() {
        let raw = json!({
            "fromId": "p1",
            "toId": "me",
            "messageType": "FILE",
            "fileUrl": "https://cdn.example/invoice.pdf"
        });
        let msg = normalize_payload(&raw, now()).unwrap();
        assert_eq!(msg.message_type, MessageType::File);
        assert!(msg.body.is_empty());
        assert!(msg.is_well_formed());
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&json!("2024-05-01 10:00:00")).unwrap(), expected);
        assert_eq!(
            parse_timestamp(&json!("2024-05-01T12:00:00+02:00")).unwrap(),
            expected
        );
        assert_eq!(
            parse_timestamp(&json!(expected.timestamp_millis())).unwrap(),
            expected
        );
    }

    #[test]
    fn test_read_flags() {
        let raw = json!({
            "fromId": "p1", "toId": "me", "body": "x",
            "is_read": 1, "deletedBySender": true
        });
        let msg = normalize_payload(&raw, now()).unwrap();
        assert!(msg.is_read);
        assert!(msg.deleted_by_sender);
        assert!(!msg.deleted_by_receiver);
    }
}
