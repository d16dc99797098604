//! Shared wiring for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chatsync_core::ports::{Clock, TransportPort};
use chatsync_engine::testing::{
    InMemoryConversationList, InMemoryFallback, InMemoryHistory, LoopbackTransport, ManualClock,
    RecordingEmitter,
};
use chatsync_engine::{Message, SyncEngine, SyncEngineDeps, SyncSettings};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};

pub const ME: &str = "me";

pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub history: Arc<InMemoryHistory>,
    pub conversations: Arc<InMemoryConversationList>,
    pub fallback: Arc<InMemoryFallback>,
    pub emitter: RecordingEmitter,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn with_transport(transport: Arc<dyn TransportPort>) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let history = Arc::new(InMemoryHistory::new());
        let conversations = Arc::new(InMemoryConversationList::new());
        let fallback = Arc::new(InMemoryFallback::new(clock.clone()));
        let emitter = RecordingEmitter::new();

        let engine = Arc::new(SyncEngine::new(SyncEngineDeps {
            current_user_id: ME.into(),
            history: history.clone(),
            transport,
            fallback: fallback.clone(),
            conversations: conversations.clone(),
            emitter: Arc::new(emitter.clone()),
            clock: clock.clone(),
            settings: SyncSettings::with_defaults(),
        }));

        Self {
            engine,
            history,
            conversations,
            fallback,
            emitter,
            clock,
        }
    }

    /// Harness with a connected loopback transport.
    pub fn loopback() -> (Self, Arc<LoopbackTransport>) {
        let transport = Arc::new(LoopbackTransport::new());
        (Self::with_transport(transport.clone()), transport)
    }

    /// Time relative to the harness epoch.
    pub fn at_ms(&self, offset: i64) -> DateTime<Utc> {
        epoch() + Duration::milliseconds(offset)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ids(&self) -> Vec<String> {
        self.engine
            .view()
            .messages
            .into_iter()
            .map(|m| m.id)
            .collect()
    }
}

/// Raw live payload in the socket's usual camelCase shape.
pub fn payload(id: &str, from: &str, to: &str, body: &str, at: DateTime<Utc>) -> Value {
    json!({
        "id": id,
        "fromId": from,
        "toId": to,
        "body": body,
        "createdAt": at.to_rfc3339(),
    })
}

/// `count` inbound messages from `participant`, one minute apart.
pub fn history(participant: &str, count: i64) -> Vec<Message> {
    (0..count)
        .map(|i| {
            Message::new(
                format!("{participant}-{i}"),
                participant,
                ME,
                format!("message {i}"),
                epoch() - Duration::minutes(count - i),
            )
        })
        .collect()
}
