//! Duplicate detection for a single conversation.
//!
//! Classification is decided against the conversation's message list. The
//! tracked-key map only narrows the search: a miss falls through to a scan
//! of the time window around the candidate, so clearing or evicting the map
//! never changes a result.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;

use chatsync_core::domain::{ContentKey, Message};

/// Outcome of classifying a candidate against a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    New,
    Duplicate,
    /// The candidate is the authoritative copy of the provisional entry
    /// `existing_id`.
    Reconciles { existing_id: String },
}

#[derive(Debug, Clone)]
struct TrackedEntry {
    id: String,
    created_at: DateTime<Utc>,
}

/// Per-conversation duplicate detector.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    window: Duration,
    max_keys: usize,
    /// Insertion order doubles as recency: the front is evicted first.
    recent: IndexMap<ContentKey, Vec<TrackedEntry>>,
}

impl Deduplicator {
    pub fn new(window: Duration, max_keys: usize) -> Self {
        Self {
            window,
            max_keys: max_keys.max(1),
            recent: IndexMap::new(),
        }
    }

    /// Classify `candidate` against `messages`, which must be sorted by
    /// `created_at`.
    pub fn classify(&self, candidate: &Message, messages: &[Message]) -> Classification {
        if !candidate.id.is_empty() && messages.iter().rev().any(|m| m.id == candidate.id) {
            return Classification::Duplicate;
        }

        // The map answers only when its answer cannot differ from the scan.
        let wants_provisional = candidate.has_server_id();
        let key = ContentKey::of(candidate);
        let matches = self
            .tracked_matches(&key, candidate, messages)
            .filter(|found| !wants_provisional || found.iter().any(|&i| messages[i].is_provisional()))
            .unwrap_or_else(|| window_matches(&key, candidate.created_at, self.window, messages));
        if matches.is_empty() {
            return Classification::New;
        }

        if wants_provisional {
            if let Some(provisional) = matches
                .iter()
                .filter_map(|&idx| messages.get(idx))
                .find(|m| m.is_provisional())
            {
                return Classification::Reconciles {
                    existing_id: provisional.id.clone(),
                };
            }
        }
        Classification::Duplicate
    }

    /// Remember `message` as present in the conversation.
    pub fn track(&mut self, message: &Message) {
        let key = ContentKey::of(message);
        let mut entries = self.recent.shift_remove(&key).unwrap_or_default();
        entries.retain(|e| e.id != message.id || message.id.is_empty());
        entries.push(TrackedEntry {
            id: message.id.clone(),
            created_at: message.created_at,
        });
        self.recent.insert(key, entries);

        while self.recent.len() > self.max_keys {
            self.recent.shift_remove_index(0);
        }
    }

    /// Point a tracked entry at its new id after reconciliation.
    pub fn rename(&mut self, message: &Message, old_id: &str) {
        if let Some(entries) = self.recent.get_mut(&ContentKey::of(message)) {
            for entry in entries.iter_mut().filter(|e| e.id == old_id) {
                entry.id.clone_from(&message.id);
            }
        }
    }

    /// Stop tracking `message`.
    pub fn forget(&mut self, message: &Message) {
        let key = ContentKey::of(message);
        if let Some(entries) = self.recent.get_mut(&key) {
            entries.retain(|e| e.id != message.id);
            if entries.is_empty() {
                self.recent.shift_remove(&key);
            }
        }
    }

    /// Rebuild tracking from scratch.
    pub fn rebuild(&mut self, messages: &[Message]) {
        self.recent.clear();
        let skip = messages.len().saturating_sub(self.max_keys);
        for message in &messages[skip..] {
            self.track(message);
        }
    }

    pub fn clear(&mut self) {
        self.recent.clear();
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    pub fn tracked_keys(&self) -> usize {
        self.recent.len()
    }

    /// Indices of tracked entries that still exist in `messages` and fall in
    /// the window. `None` means the map knows nothing useful.
    fn tracked_matches(
        &self,
        key: &ContentKey,
        candidate: &Message,
        messages: &[Message],
    ) -> Option<Vec<usize>> {
        let entries = self.recent.get(key)?;
        let found: Vec<usize> = entries
            .iter()
            .filter(|e| within(e.created_at, candidate.created_at, self.window))
            .filter_map(|e| {
                messages
                    .iter()
                    .rposition(|m| m.id == e.id && m.created_at == e.created_at)
            })
            .filter(|&idx| ContentKey::of(&messages[idx]) == *key)
            .collect();
        (!found.is_empty()).then_some(found)
    }
}

fn within(a: DateTime<Utc>, b: DateTime<Utc>, window: Duration) -> bool {
    a.signed_duration_since(b).abs() < window
}

/// Indices of messages sharing `key` with `|created_at - at| < window`,
/// located by binary search on the sorted list.
///
/// Bounds are compared as differences so timestamps at the edge of the
/// representable range cannot overflow.
fn window_matches(
    key: &ContentKey,
    at: DateTime<Utc>,
    window: Duration,
    messages: &[Message],
) -> Vec<usize> {
    let start = messages.partition_point(|m| at.signed_duration_since(m.created_at) >= window);
    messages[start..]
        .iter()
        .take_while(|m| m.created_at.signed_duration_since(at) < window)
        .enumerate()
        .filter(|(_, m)| ContentKey::of(m) == *key)
        .map(|(offset, _)| start + offset)
        .collect()
}
