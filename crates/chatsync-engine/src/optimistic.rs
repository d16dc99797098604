//! Optimistic send tracking.
//!
//! The reconciler mints provisional messages and remembers which ones are
//! still waiting for the server. It never owns the message itself: once
//! created, the message lives in its conversation store and only the key,
//! id and deadline stay here.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;

use chatsync_core::domain::{ContentKey, Message, MessageKey, identify};
use chatsync_core::settings::SyncSettings;

/// A send waiting for its echo or REST confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub provisional_id: String,
    pub participant_id: String,
    pub key: MessageKey,
    /// Original text, returned to the composer on failure.
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// Tracks provisional messages until they are confirmed, fail, or expire.
#[derive(Debug, Clone)]
pub struct OptimisticSendReconciler {
    pending: IndexMap<String, PendingSend>,
    seq: u64,
    timeout: Duration,
    debounce: Duration,
    bucket_secs: u32,
}

impl OptimisticSendReconciler {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            pending: IndexMap::new(),
            seq: 0,
            timeout: settings.pending_timeout(),
            debounce: settings.send_debounce(),
            bucket_secs: settings.effective_dedup_bucket_secs(),
        }
    }

    /// Mint a PENDING provisional message and start tracking it.
    pub fn create(
        &mut self,
        from_id: &str,
        to_id: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Message {
        let message = Message::provisional(from_id, to_id, body, now, self.seq);
        self.seq += 1;

        self.pending.insert(
            message.id.clone(),
            PendingSend {
                provisional_id: message.id.clone(),
                participant_id: to_id.to_string(),
                key: identify(&message, self.bucket_secs),
                body: body.to_string(),
                created_at: now,
                deadline: now + self.timeout,
            },
        );
        message
    }

    /// A pending send with the same content created less than the debounce
    /// window ago.
    pub fn find_in_flight(
        &self,
        from_id: &str,
        to_id: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Option<&PendingSend> {
        let content = ContentKey::new(from_id, to_id, body);
        self.pending
            .values()
            .rev()
            .find(|p| p.key.content == content && now - p.created_at < self.debounce)
    }

    /// The server confirmed the send.
    pub fn confirm(&mut self, provisional_id: &str) -> Option<PendingSend> {
        self.pending.shift_remove(provisional_id)
    }

    /// Stop tracking without confirmation (send failed or was discarded).
    pub fn forget(&mut self, provisional_id: &str) -> Option<PendingSend> {
        self.pending.shift_remove(provisional_id)
    }

    /// Stop tracking every send to `participant_id`.
    pub fn forget_conversation(&mut self, participant_id: &str) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, p| p.participant_id != participant_id);
        before - self.pending.len()
    }

    /// Remove and return every send whose deadline has passed.
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> Vec<PendingSend> {
        let expired: Vec<String> = self
            .pending
            .values()
            .filter(|p| p.deadline <= now)
            .map(|p| p.provisional_id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|id| self.pending.shift_remove(id))
            .collect()
    }

    pub fn is_pending(&self, provisional_id: &str) -> bool {
        self.pending.contains_key(provisional_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
