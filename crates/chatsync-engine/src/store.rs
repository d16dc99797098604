//! Per-participant message store.
//!
//! A [`ConversationStore`] owns the canonical, ordered message list for one
//! conversation. Every merge keeps the list sorted by `created_at` with ties
//! in insertion order. Malformed messages are logged and dropped; no store
//! operation fails.

use std::collections::HashSet;

use tracing::{debug, warn};

use chatsync_core::domain::{ContentKey, DeliveryState, Message};
use chatsync_core::settings::SyncSettings;

use crate::dedup::{Classification, Deduplicator};

/// A provisional entry replaced by its authoritative copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub provisional_id: String,
    pub message_id: String,
}

/// Result of [`ConversationStore::seed`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    /// Messages taken from the page.
    pub accepted: usize,
    /// Malformed or repeated page entries.
    pub rejected: usize,
    /// Local entries kept because the page did not contain them.
    pub retained: usize,
    /// Provisional entries whose confirmed copy was in the page.
    pub confirmed: Vec<Reconciled>,
}

/// Result of [`ConversationStore::prepend_older`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrependOutcome {
    pub added: usize,
    pub reconciled: Vec<Reconciled>,
    /// The page overlapped existing messages and the list was re-sorted.
    pub resorted: bool,
}

/// Ordered message list for one participant.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    participant_id: String,
    messages: Vec<Message>,
    unread_count: u32,
    dedup: Deduplicator,
}

impl ConversationStore {
    pub fn new(participant_id: impl Into<String>, settings: &SyncSettings) -> Self {
        Self {
            participant_id: participant_id.into(),
            messages: Vec::new(),
            unread_count: 0,
            dedup: Deduplicator::new(
                settings.reconcile_window(),
                settings.effective_max_tracked_keys(),
            ),
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub const fn len(&self) -> usize {
        self.messages.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.position(id).map(|idx| &self.messages[idx])
    }

    /// Newest message in the loaded window.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub const fn unread_count(&self) -> u32 {
        self.unread_count
    }

    /// Replace the list with a freshly fetched first page.
    ///
    /// Local entries missing from the page (live arrivals during the fetch,
    /// provisional sends, previously loaded older pages) are merged back,
    /// except provisional entries the page already confirms.
    pub fn seed(&mut self, page: Vec<Message>) -> SeedOutcome {
        let mut outcome = SeedOutcome::default();
        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(page.len() + self.messages.len());

        for message in page {
            if !self.accepts(&message) || (!message.id.is_empty() && !seen.insert(message.id.clone()))
            {
                outcome.rejected += 1;
                continue;
            }
            merged.push(message);
        }
        merged.sort_by_key(|m| m.created_at);
        outcome.accepted = merged.len();

        let window = self.dedup_window();
        for local in std::mem::take(&mut self.messages) {
            if !local.id.is_empty() && seen.contains(&local.id) {
                continue;
            }
            if local.is_provisional() {
                let key = ContentKey::of(&local);
                if let Some(confirmed) = merged.iter().find(|m| {
                    m.has_server_id()
                        && ContentKey::of(m) == key
                        && m.created_at.signed_duration_since(local.created_at).abs() < window
                }) {
                    outcome.confirmed.push(Reconciled {
                        provisional_id: local.id.clone(),
                        message_id: confirmed.id.clone(),
                    });
                    continue;
                }
            }
            outcome.retained += 1;
            insert_sorted(&mut merged, local);
        }

        self.messages = merged;
        self.dedup.rebuild(&self.messages);
        debug!(
            participant_id = %self.participant_id,
            accepted = outcome.accepted,
            retained = outcome.retained,
            "Seeded conversation"
        );
        outcome
    }

    /// Merge one live message. Returns `None` if it was malformed.
    pub fn append_live(&mut self, message: Message) -> Option<Classification> {
        if !self.accepts(&message) {
            return None;
        }

        let classification = self.dedup.classify(&message, &self.messages);
        match &classification {
            Classification::New => {
                self.dedup.track(&message);
                insert_sorted(&mut self.messages, message);
            }
            Classification::Reconciles { existing_id } => {
                self.reconcile(existing_id, &message);
            }
            Classification::Duplicate => {
                debug!(
                    participant_id = %self.participant_id,
                    id = %message.id,
                    "Dropping duplicate message"
                );
            }
        }
        Some(classification)
    }

    /// Insert a freshly created provisional message.
    ///
    /// Only id collisions are checked; content matching is left to the
    /// sender's debounce.
    pub fn insert_provisional(&mut self, message: Message) -> bool {
        if !self.accepts(&message) || self.position(&message.id).is_some() {
            return false;
        }
        self.dedup.track(&message);
        insert_sorted(&mut self.messages, message);
        true
    }

    /// Merge an older page at the head of the list.
    pub fn prepend_older(&mut self, page: Vec<Message>) -> PrependOutcome {
        let mut outcome = PrependOutcome::default();
        let mut seen: HashSet<String> = self
            .messages
            .iter()
            .filter(|m| !m.id.is_empty())
            .map(|m| m.id.clone())
            .collect();

        let mut older = Vec::with_capacity(page.len());
        for message in page {
            if !self.accepts(&message) {
                continue;
            }
            if !message.id.is_empty() && !seen.insert(message.id.clone()) {
                continue;
            }
            if let Classification::Reconciles { existing_id } =
                self.dedup.classify(&message, &self.messages)
            {
                if let Some(done) = self.reconcile(&existing_id, &message) {
                    outcome.reconciled.push(done);
                }
                continue;
            }
            older.push(message);
        }
        older.sort_by_key(|m| m.created_at);
        outcome.added = older.len();

        let fits_before_head = match (older.last(), self.messages.first()) {
            (Some(newest), Some(head)) => newest.created_at <= head.created_at,
            _ => true,
        };
        for message in &older {
            self.dedup.track(message);
        }
        if fits_before_head {
            self.messages.splice(0..0, older);
        } else {
            debug!(
                participant_id = %self.participant_id,
                "Older page overlaps loaded messages, re-sorting"
            );
            self.messages.extend(older);
            self.messages.sort_by_key(|m| m.created_at);
            outcome.resorted = true;
        }
        outcome
    }

    /// Confirm a provisional entry with the copy returned by the REST
    /// fallback. Returns the stored message afterwards.
    pub fn confirm(&mut self, provisional_id: &str, confirmed: &Message) -> Option<&Message> {
        if self.position(&confirmed.id).is_some() {
            // The echo got here first; drop the now redundant provisional.
            if provisional_id != confirmed.id {
                self.remove(provisional_id);
            }
            return self.get(&confirmed.id);
        }
        if self.position(provisional_id).is_some() {
            self.reconcile(provisional_id, confirmed);
            return self.get(&confirmed.id);
        }
        self.dedup.track(confirmed);
        insert_sorted(&mut self.messages, confirmed.clone());
        self.get(&confirmed.id)
    }

    /// Remove a message by id.
    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let idx = self.position(id)?;
        let removed = self.messages.remove(idx);
        self.dedup.forget(&removed);
        Some(removed)
    }

    /// Change a message's delivery state. Returns false if it is unknown.
    pub fn set_delivery_state(&mut self, id: &str, state: DeliveryState) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.messages[idx].delivery_state = state;
                true
            }
            None => false,
        }
    }

    pub const fn record_unread(&mut self) {
        self.unread_count = self.unread_count.saturating_add(1);
    }

    /// Reset the unread counter. Per-message `is_read` is left alone.
    pub const fn mark_read(&mut self) {
        self.unread_count = 0;
    }

    /// Forget tracked dedup keys (on conversation switch).
    pub fn clear_tracking(&mut self) {
        self.dedup.clear();
    }

    /// Whether the ordering invariant holds.
    pub fn is_ordered(&self) -> bool {
        self.messages.is_sorted_by_key(|m| m.created_at)
    }

    fn position(&self, id: &str) -> Option<usize> {
        if id.is_empty() {
            return None;
        }
        self.messages.iter().rposition(|m| m.id == id)
    }

    fn dedup_window(&self) -> chrono::Duration {
        self.dedup.window()
    }

    fn accepts(&self, message: &Message) -> bool {
        if message.is_well_formed() {
            return true;
        }
        warn!(
            participant_id = %self.participant_id,
            id = %message.id,
            "Rejecting malformed message"
        );
        false
    }

    /// Splice the authoritative copy over a provisional entry, keeping its
    /// position.
    fn reconcile(&mut self, existing_id: &str, confirmed: &Message) -> Option<Reconciled> {
        let idx = self.position(existing_id)?;
        let entry = &mut self.messages[idx];
        entry.adopt_confirmation(confirmed);
        self.dedup.rename(&self.messages[idx], existing_id);
        debug!(
            participant_id = %self.participant_id,
            provisional_id = %existing_id,
            id = %confirmed.id,
            "Reconciled provisional message"
        );
        Some(Reconciled {
            provisional_id: existing_id.to_string(),
            message_id: confirmed.id.clone(),
        })
    }
}

/// Insert after every message not newer than `message`.
fn insert_sorted(messages: &mut Vec<Message>, message: Message) {
    let idx = messages.partition_point(|m| m.created_at <= message.created_at);
    messages.insert(idx, message);
}
