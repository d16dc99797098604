//! In-memory port implementations for tests and offline replays.
//!
//! Enabled with the `test-utils` feature.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::{Semaphore, mpsc, watch};

use chatsync_core::domain::{ConversationFilters, ConversationSummary, HistoryPage, Message};
use chatsync_core::events::SyncEvent;
use chatsync_core::ports::{
    Clock, ConversationListError, ConversationListPort, FallbackSendPort, HistoryError,
    HistoryPort, LiveSubscription, SyncEventEmitter, TransportError, TransportPort,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// History
// =============================================================================

/// Paged history backed by per-participant message lists.
///
/// Page 1 holds the newest messages. Requests for participants put on hold
/// block until [`InMemoryHistory::release_one`] is called, which lets tests
/// switch conversations while a fetch is in flight.
pub struct InMemoryHistory {
    conversations: Mutex<HashMap<String, Vec<Message>>>,
    fail_next: Mutex<Option<HistoryError>>,
    held: Mutex<HashSet<String>>,
    gate: Semaphore,
    requests: Mutex<Vec<(String, u32)>>,
    request_count: watch::Sender<usize>,
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHistory {
    pub fn new() -> Self {
        let (request_count, _) = watch::channel(0);
        Self {
            conversations: Mutex::new(HashMap::new()),
            fail_next: Mutex::new(None),
            held: Mutex::new(HashSet::new()),
            gate: Semaphore::new(0),
            requests: Mutex::new(Vec::new()),
            request_count,
        }
    }

    /// Add messages to a participant's history.
    pub fn insert_history(&self, participant_id: &str, messages: impl IntoIterator<Item = Message>) {
        let mut conversations = lock(&self.conversations);
        let history = conversations.entry(participant_id.to_string()).or_default();
        history.extend(messages);
        history.sort_by_key(|m| m.created_at);
    }

    /// Fail the next request with `error`.
    pub fn fail_next(&self, error: HistoryError) {
        *lock(&self.fail_next) = Some(error);
    }

    /// Block requests for `participant_id` until released.
    pub fn hold(&self, participant_id: &str) {
        lock(&self.held).insert(participant_id.to_string());
    }

    /// Let one held request through.
    pub fn release_one(&self) {
        self.gate.add_permits(1);
    }

    /// Every request received so far, as `(participant_id, page)`.
    pub fn requests(&self) -> Vec<(String, u32)> {
        lock(&self.requests).clone()
    }

    /// Wait until at least `n` requests have been received.
    pub async fn wait_for_requests(&self, n: usize) {
        let mut rx = self.request_count.subscribe();
        // The sender lives in self, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    fn page_of(&self, participant_id: &str, page: u32, page_size: u32) -> HistoryPage {
        let conversations = lock(&self.conversations);
        let history = conversations
            .get(participant_id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let size = page_size.max(1) as usize;
        let total = history.len();
        let last_page = u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX).max(1);
        let skip = (page.saturating_sub(1) as usize).saturating_mul(size);
        let end = total.saturating_sub(skip);
        let start = end.saturating_sub(size);

        // Newest first, as most chat backends return them.
        let messages = history[start..end].iter().rev().cloned().collect();
        HistoryPage {
            messages,
            total: total as u64,
            current_page: page,
            last_page,
        }
    }
}

#[async_trait]
impl HistoryPort for InMemoryHistory {
    async fn fetch_page(
        &self,
        participant_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<HistoryPage, HistoryError> {
        let count = {
            let mut requests = lock(&self.requests);
            requests.push((participant_id.to_string(), page));
            requests.len()
        };
        self.request_count.send_replace(count);

        let held = lock(&self.held).contains(participant_id);
        if held {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }

        if let Some(error) = lock(&self.fail_next).take() {
            return Err(error);
        }
        Ok(self.page_of(participant_id, page, page_size))
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Live transport that records sends and lets tests push payloads.
pub struct LoopbackTransport {
    connected: AtomicBool,
    sent: Mutex<Vec<(String, String, String)>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Value>>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Sends accepted so far, as `(from, to, body)`.
    pub fn sent(&self) -> Vec<(String, String, String)> {
        lock(&self.sent).clone()
    }

    /// Deliver a raw payload to every live subscriber.
    pub fn push(&self, payload: Value) {
        lock(&self.subscribers).retain(|tx| tx.send(payload.clone()).is_ok());
    }
}

impl TransportPort for LoopbackTransport {
    fn send(&self, from_id: &str, to_id: &str, body: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        lock(&self.sent).push((from_id.to_string(), to_id.to_string(), body.to_string()));
        Ok(())
    }

    fn subscribe(&self) -> LiveSubscription {
        let (tx, subscription) = LiveSubscription::channel();
        lock(&self.subscribers).push(tx);
        subscription
    }
}

/// REST send path that answers with ids `rest-1`, `rest-2`, ...
pub struct InMemoryFallback {
    clock: Arc<dyn Clock>,
    failure: Mutex<Option<TransportError>>,
    calls: AtomicUsize,
}

impl InMemoryFallback {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every following call with `error`.
    pub fn fail_with(&self, error: TransportError) {
        *lock(&self.failure) = Some(error);
    }

    pub fn recover(&self) {
        *lock(&self.failure) = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FallbackSendPort for InMemoryFallback {
    async fn send_fallback_rest(
        &self,
        from_id: &str,
        to_id: &str,
        body: &str,
    ) -> Result<Message, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }
        Ok(Message::new(
            format!("rest-{n}"),
            from_id,
            to_id,
            body,
            self.clock.now(),
        ))
    }
}

// =============================================================================
// Conversation list
// =============================================================================

/// Conversation list that applies filters the way the REST endpoint does.
#[derive(Default)]
pub struct InMemoryConversationList {
    summaries: Mutex<Vec<ConversationSummary>>,
    fail_next: Mutex<Option<ConversationListError>>,
}

impl InMemoryConversationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, summaries: Vec<ConversationSummary>) {
        *lock(&self.summaries) = summaries;
    }

    pub fn fail_next(&self, error: ConversationListError) {
        *lock(&self.fail_next) = Some(error);
    }
}

fn matches_filters(summary: &ConversationSummary, filters: &ConversationFilters) -> bool {
    if filters.role.is_some_and(|role| role != summary.participant_role) {
        return false;
    }
    if filters.unread_only && summary.unread_count == 0 {
        return false;
    }
    match filters.search.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(needle) => {
            let needle = needle.to_lowercase();
            summary.participant_name.to_lowercase().contains(&needle)
                || summary
                    .last_message
                    .as_ref()
                    .is_some_and(|m| m.body.to_lowercase().contains(&needle))
        }
    }
}

#[async_trait]
impl ConversationListPort for InMemoryConversationList {
    async fn fetch(
        &self,
        filters: &ConversationFilters,
    ) -> Result<Vec<ConversationSummary>, ConversationListError> {
        if let Some(error) = lock(&self.fail_next).take() {
            return Err(error);
        }
        Ok(lock(&self.summaries)
            .iter()
            .filter(|s| matches_filters(s, filters))
            .cloned()
            .collect())
    }
}

// =============================================================================
// Emitter and clock
// =============================================================================

/// Emitter that keeps every event. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        lock(&self.events).clone()
    }

    /// Event names in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        lock(&self.events).iter().map(SyncEvent::event_name).collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl SyncEventEmitter for RecordingEmitter {
    fn emit(&self, event: SyncEvent) {
        lock(&self.events).push(event);
    }

    fn clone_box(&self) -> Box<dyn SyncEventEmitter> {
        Box::new(self.clone())
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn advance_ms(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *lock(&self.now) = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}
