//! Sync engine orchestrator.
//!
//! # Architecture
//!
//! - **Engine**: owns every store, the pagination controller, the send
//!   reconciler and the summary list inside one `EngineState`
//! - **Ports**: history, transport, fallback send and conversation list are
//!   injected as trait objects
//! - **Background tasks**: a live listener and a pending-timeout watchdog,
//!   both stopped through a `CancellationToken`
//!
//! # Concurrency Model
//!
//! - Every mutation goes through the single `state` mutex
//! - The mutex is never held across an await on a port
//! - Page responses carry a generation; anything that comes back after a
//!   conversation switch is discarded at the callback boundary
//! - View state is republished on a `watch` channel after each mutation

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatsync_core::domain::{
    ConversationFilters, ConversationSummary, DeliveryState, HistoryPage, Message, Participant,
    normalize_payload,
};
use chatsync_core::errors::SendError;
use chatsync_core::events::{SyncEvent, ViewState};
use chatsync_core::ports::{
    Clock, ConversationListPort, FallbackSendPort, HistoryPort, SyncError, SyncEventEmitter,
    TransportError, TransportPort,
};
use chatsync_core::settings::SyncSettings;

use crate::dedup::Classification;
use crate::optimistic::OptimisticSendReconciler;
use crate::pagination::{PageRequest, PaginationController, RequestKind};
use crate::store::{ConversationStore, Reconciled};
use crate::summaries::ConversationListSynchronizer;

/// Dependencies for building a [`SyncEngine`].
pub struct SyncEngineDeps {
    /// Id of the signed-in user; decides message direction.
    pub current_user_id: String,
    pub history: Arc<dyn HistoryPort>,
    pub transport: Arc<dyn TransportPort>,
    pub fallback: Arc<dyn FallbackSendPort>,
    pub conversations: Arc<dyn ConversationListPort>,
    pub emitter: Arc<dyn SyncEventEmitter>,
    pub clock: Arc<dyn Clock>,
    pub settings: SyncSettings,
}

/// What happened to a live payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveOutcome {
    /// Failed normalization or did not involve the current user.
    Rejected,
    Accepted {
        participant_id: String,
        classification: Classification,
    },
}

/// All mutable engine state. Only touched with the engine lock held.
struct EngineState {
    active: Option<String>,
    stores: HashMap<String, ConversationStore>,
    pagination: PaginationController,
    reconciler: OptimisticSendReconciler,
    summaries: ConversationListSynchronizer,
    last_error: Option<String>,
}

impl EngineState {
    fn new(settings: &SyncSettings) -> Self {
        Self {
            active: None,
            stores: HashMap::new(),
            pagination: PaginationController::new(settings.effective_page_size()),
            reconciler: OptimisticSendReconciler::new(settings),
            summaries: ConversationListSynchronizer::new(),
            last_error: None,
        }
    }

    fn store_mut(&mut self, participant_id: &str, settings: &SyncSettings) -> &mut ConversationStore {
        self.stores
            .entry(participant_id.to_string())
            .or_insert_with(|| ConversationStore::new(participant_id, settings))
    }

    fn is_active(&self, participant_id: &str) -> bool {
        self.active.as_deref() == Some(participant_id)
    }

    /// Locate a message in any store.
    fn find_message(&self, id: &str) -> Option<(String, Message)> {
        let active = self.active.as_deref().and_then(|p| self.stores.get(p));
        active
            .into_iter()
            .chain(self.stores.values())
            .find_map(|store| {
                store
                    .get(id)
                    .map(|m| (store.participant_id().to_string(), m.clone()))
            })
    }

    fn view(&self) -> ViewState {
        let messages = self
            .active
            .as_deref()
            .and_then(|p| self.stores.get(p))
            .map(|s| s.messages().to_vec())
            .unwrap_or_default();
        ViewState {
            active_participant: self.active.clone(),
            messages,
            pagination: self.pagination.view(),
            summaries: self.summaries.ordered(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Conversation synchronization engine.
///
/// Merges REST history, live events and optimistic sends into one
/// deduplicated, ordered message list per conversation.
pub struct SyncEngine {
    current_user_id: String,
    settings: SyncSettings,
    history: Arc<dyn HistoryPort>,
    transport: Arc<dyn TransportPort>,
    fallback: Arc<dyn FallbackSendPort>,
    conversations: Arc<dyn ConversationListPort>,
    emitter: Arc<dyn SyncEventEmitter>,
    clock: Arc<dyn Clock>,
    state: Mutex<EngineState>,
    view_tx: watch::Sender<ViewState>,
    cancel: CancellationToken,
}

impl SyncEngine {
    pub fn new(deps: SyncEngineDeps) -> Self {
        let state = EngineState::new(&deps.settings);
        let (view_tx, _) = watch::channel(state.view());
        Self {
            current_user_id: deps.current_user_id,
            settings: deps.settings,
            history: deps.history,
            transport: deps.transport,
            fallback: deps.fallback,
            conversations: deps.conversations,
            emitter: deps.emitter,
            clock: deps.clock,
            state: Mutex::new(state),
            view_tx,
            cancel: CancellationToken::new(),
        }
    }

    pub fn current_user_id(&self) -> &str {
        &self.current_user_id
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Subscribe to view state. The receiver always holds the latest value.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view_tx.subscribe()
    }

    /// Current view state.
    pub fn view(&self) -> ViewState {
        self.view_tx.borrow().clone()
    }

    /// Generation of the active conversation.
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.pagination.generation()
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// Make `participant_id` the active conversation and load its first page.
    ///
    /// Any history request still in flight for the previous conversation
    /// becomes stale.
    pub async fn select_conversation(&self, participant_id: &str) -> Result<(), SyncError> {
        let request = {
            let mut state = self.state.lock().await;
            if let Some(previous) = state.active.take() {
                if let Some(store) = state.stores.get_mut(&previous) {
                    store.clear_tracking();
                }
            }

            let generation = state.pagination.activate(participant_id);
            state.store_mut(participant_id, &self.settings).mark_read();
            state.summaries.ensure(Participant::unnamed(participant_id));
            state.summaries.mark_read(participant_id);
            state.active = Some(participant_id.to_string());
            state.last_error = None;

            info!(participant_id = %participant_id, generation, "Conversation selected");
            self.emitter
                .emit(SyncEvent::conversation_selected(participant_id, generation));

            let request = state.pagination.begin_initial();
            self.publish(&state);
            request
        };

        match request {
            Some(request) => self.run_page_request(request).await,
            None => Ok(()),
        }
    }

    /// (Re)try the first-page load of the active conversation. A no-op while
    /// a load is running or after it succeeded.
    pub async fn load_initial(&self) -> Result<(), SyncError> {
        let request = {
            let mut state = self.state.lock().await;
            if state.active.is_none() {
                return Err(SyncError::NoActiveConversation);
            }
            let request = state.pagination.begin_initial();
            self.publish(&state);
            request
        };
        match request {
            Some(request) => self.run_page_request(request).await,
            None => Ok(()),
        }
    }

    /// Load the next older page of the active conversation. A no-op unless
    /// pagination is ready and more pages exist.
    pub async fn load_older_messages(&self) -> Result<(), SyncError> {
        let request = {
            let mut state = self.state.lock().await;
            if state.active.is_none() {
                return Err(SyncError::NoActiveConversation);
            }
            let request = state.pagination.begin_older();
            if request.is_some() {
                self.publish(&state);
            }
            request
        };
        match request {
            Some(request) => self.run_page_request(request).await,
            None => Ok(()),
        }
    }

    /// Register a participant (e.g. from a chat link) without selecting it.
    pub async fn ensure_conversation(&self, participant: Participant) {
        let mut state = self.state.lock().await;
        state.store_mut(&participant.id, &self.settings);
        state.summaries.ensure(participant);
        self.publish(&state);
    }

    /// Drop a conversation's store and pending sends. Its summary stays in
    /// the list.
    pub async fn close_conversation(&self, participant_id: &str) {
        let mut state = self.state.lock().await;
        state.stores.remove(participant_id);
        let dropped = state.reconciler.forget_conversation(participant_id);
        if state.is_active(participant_id) {
            state.active = None;
            state.pagination.deactivate();
        }
        debug!(participant_id = %participant_id, dropped, "Conversation closed");
        self.publish(&state);
    }

    /// Merge an externally obtained conversation list.
    pub async fn seed_summaries(&self, summaries: Vec<ConversationSummary>) {
        let mut state = self.state.lock().await;
        state.summaries.seed(summaries);
        if let Some(active) = state.active.clone() {
            state.summaries.mark_read(&active);
        }
        self.publish(&state);
    }

    /// Fetch the conversation list and merge it. Returns the number of
    /// summaries fetched.
    pub async fn refresh_summaries(&self, filters: &ConversationFilters) -> Result<usize, SyncError> {
        match self.conversations.fetch(filters).await {
            Ok(fetched) => {
                let count = fetched.len();
                self.seed_summaries(fetched).await;
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "Conversation list refresh failed");
                let mut state = self.state.lock().await;
                state.last_error = Some(e.to_string());
                self.publish(&state);
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    async fn run_page_request(&self, request: PageRequest) -> Result<(), SyncError> {
        debug!(
            participant_id = %request.participant_id,
            page = request.page,
            generation = request.generation,
            "Fetching history page"
        );
        let result = self
            .history
            .fetch_page(&request.participant_id, request.page, request.page_size)
            .await;

        let mut state = self.state.lock().await;
        if !state.pagination.is_current(&request) {
            debug!(
                participant_id = %request.participant_id,
                page = request.page,
                generation = request.generation,
                current = state.pagination.generation(),
                "Discarding stale history response"
            );
            self.emitter.emit(SyncEvent::stale_response_discarded(
                &request.participant_id,
                request.page,
                request.generation,
            ));
            return Ok(());
        }

        match result {
            Ok(page) => {
                self.merge_page(&mut state, &request, page);
                self.publish(&state);
                Ok(())
            }
            Err(e) => {
                warn!(
                    participant_id = %request.participant_id,
                    page = request.page,
                    error = %e,
                    "History fetch failed"
                );
                // Current by the check above, so this cannot be stale.
                let _ = state.pagination.fail(&request);
                state.last_error = Some(e.to_string());
                self.emitter.emit(SyncEvent::page_load_failed(
                    &request.participant_id,
                    request.page,
                    e.to_string(),
                ));
                self.publish(&state);
                Err(e.into())
            }
        }
    }

    fn merge_page(&self, state: &mut EngineState, request: &PageRequest, page: HistoryPage) {
        let participant_id = request.participant_id.as_str();
        let count = page.messages.len();
        let cursor = state.pagination.complete(request, &page);

        let store = state.store_mut(participant_id, &self.settings);
        let confirmed = match request.kind {
            RequestKind::Initial => store.seed(page.messages).confirmed,
            RequestKind::Older => store.prepend_older(page.messages).reconciled,
        };
        let last = store.last_message().cloned();

        for done in &confirmed {
            self.finish_reconcile(state, participant_id, done);
        }
        if let Some(last) = last {
            state.summaries.ensure(Participant::unnamed(participant_id));
            state.summaries.observe(participant_id, &last);
        }
        state.last_error = None;

        let has_more = cursor.is_ok_and(|c| c.has_more);
        info!(
            participant_id = %participant_id,
            page = request.page,
            count,
            has_more,
            "History page merged"
        );
        self.emitter.emit(SyncEvent::page_loaded(
            participant_id,
            request.page,
            count,
            has_more,
        ));
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send `body` to the active conversation.
    ///
    /// The provisional message is visible before this returns. On success the
    /// returned message is either still PENDING (waiting for its echo) or
    /// already confirmed through the REST fallback.
    pub async fn send_message(&self, body: &str) -> Result<Message, SendError> {
        let to = self
            .state
            .lock()
            .await
            .active
            .clone()
            .ok_or(SendError::NoActiveConversation)?;
        self.send_to(&to, body).await
    }

    async fn send_to(&self, to: &str, body: &str) -> Result<Message, SendError> {
        if body.trim().is_empty() {
            return Err(SendError::EmptyBody);
        }

        let provisional = {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let in_flight = state
                .reconciler
                .find_in_flight(&self.current_user_id, to, body, now);
            if let Some(in_flight) = in_flight {
                debug!(provisional_id = %in_flight.provisional_id, "Rejecting repeated send");
                return Err(SendError::DuplicateInFlight {
                    provisional_id: in_flight.provisional_id.clone(),
                });
            }

            let message = state
                .reconciler
                .create(&self.current_user_id, to, body, now);
            state
                .store_mut(to, &self.settings)
                .insert_provisional(message.clone());
            let is_active = state.is_active(to);
            state.summaries.on_message_accepted(to, &message, is_active);
            self.emitter
                .emit(SyncEvent::message_accepted(to, message.clone()));
            self.publish(&state);
            message
        };

        match self.transport.send(&self.current_user_id, to, body) {
            Ok(()) => Ok(provisional),
            Err(TransportError::NotConnected) => {
                info!(participant_id = %to, "Live transport offline, sending over REST");
                match self
                    .fallback
                    .send_fallback_rest(&self.current_user_id, to, body)
                    .await
                {
                    Ok(confirmed) => Ok(self.confirm_send(to, &provisional, &confirmed).await),
                    Err(e) => Err(self.abandon_send(to, &provisional, body, &e).await),
                }
            }
            Err(e) => Err(self.abandon_send(to, &provisional, body, &e).await),
        }
    }

    async fn confirm_send(&self, to: &str, provisional: &Message, confirmed: &Message) -> Message {
        let mut state = self.state.lock().await;
        state.reconciler.confirm(&provisional.id);
        let stored = state
            .store_mut(to, &self.settings)
            .confirm(&provisional.id, confirmed)
            .cloned()
            .unwrap_or_else(|| confirmed.clone());
        state
            .summaries
            .replace_last_message(to, &provisional.id, &stored);
        info!(participant_id = %to, id = %stored.id, "Send confirmed over REST");
        self.emitter.emit(SyncEvent::message_reconciled(
            to,
            &provisional.id,
            &stored.id,
        ));
        self.publish(&state);
        stored
    }

    /// Both send paths failed: drop the provisional entry and hand the text
    /// back.
    async fn abandon_send(
        &self,
        to: &str,
        provisional: &Message,
        body: &str,
        error: &TransportError,
    ) -> SendError {
        let mut state = self.state.lock().await;
        state.reconciler.forget(&provisional.id);
        if let Some(store) = state.stores.get_mut(to) {
            store.remove(&provisional.id);
            let fallback = store.last_message().cloned();
            state
                .summaries
                .revert_last_message(to, &provisional.id, fallback.as_ref());
        }
        let reason = error.to_string();
        warn!(participant_id = %to, error = %reason, "Send failed");
        state.last_error = Some(reason.clone());
        self.emitter
            .emit(SyncEvent::send_failed(to, body, reason.clone()));
        self.publish(&state);
        SendError::failed(body, reason)
    }

    /// Re-send a FAILED message. The failed entry is removed first.
    pub async fn retry_failed(&self, id: &str) -> Result<Message, SendError> {
        let (to, body) = self.take_failed(id).await?;
        self.send_to(&to, &body).await
    }

    /// Remove a FAILED message and return its text for editing.
    pub async fn discard_failed(&self, id: &str) -> Result<String, SendError> {
        self.take_failed(id).await.map(|(_, body)| body)
    }

    async fn take_failed(&self, id: &str) -> Result<(String, String), SendError> {
        let mut state = self.state.lock().await;
        let not_retryable = || SendError::NotRetryable { id: id.to_string() };
        let (participant_id, message) = state.find_message(id).ok_or_else(not_retryable)?;
        if message.delivery_state != DeliveryState::Failed {
            return Err(not_retryable());
        }

        if let Some(store) = state.stores.get_mut(&participant_id) {
            store.remove(id);
            let fallback = store.last_message().cloned();
            state
                .summaries
                .revert_last_message(&participant_id, id, fallback.as_ref());
        }
        state.reconciler.forget(id);
        self.publish(&state);
        Ok((participant_id, message.body))
    }

    // =========================================================================
    // Live events
    // =========================================================================

    /// Apply one raw payload from the live channel.
    pub async fn handle_live_event(&self, raw: &Value) -> LiveOutcome {
        let message = match normalize_payload(raw, self.clock.now()) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping malformed live payload");
                self.emitter.emit(SyncEvent::message_rejected(e.to_string()));
                return LiveOutcome::Rejected;
            }
        };
        let Some(participant_id) = message
            .counterpart(&self.current_user_id)
            .map(str::to_string)
        else {
            warn!(from = %message.from_id, to = %message.to_id, "Live message not addressed to current user");
            self.emitter
                .emit(SyncEvent::message_rejected("not addressed to current user"));
            return LiveOutcome::Rejected;
        };

        let mut state = self.state.lock().await;
        let is_active = state.is_active(&participant_id);
        let inbound = message.from_id == participant_id;
        let store = state.store_mut(&participant_id, &self.settings);
        let Some(classification) = store.append_live(message.clone()) else {
            self.emitter
                .emit(SyncEvent::message_rejected("malformed message"));
            return LiveOutcome::Rejected;
        };

        match &classification {
            Classification::New => {
                if inbound && !is_active {
                    store.record_unread();
                }
                state
                    .summaries
                    .on_message_accepted(&participant_id, &message, is_active);
                debug!(participant_id = %participant_id, id = %message.id, "Live message accepted");
                self.emitter
                    .emit(SyncEvent::message_accepted(&participant_id, message));
                self.publish(&state);
            }
            Classification::Reconciles { existing_id } => {
                let done = Reconciled {
                    provisional_id: existing_id.clone(),
                    message_id: message.id.clone(),
                };
                self.finish_reconcile(&mut state, &participant_id, &done);
                self.publish(&state);
            }
            Classification::Duplicate => {}
        }

        LiveOutcome::Accepted {
            participant_id,
            classification,
        }
    }

    /// Bookkeeping after a provisional entry was replaced in its store.
    fn finish_reconcile(&self, state: &mut EngineState, participant_id: &str, done: &Reconciled) {
        state.reconciler.confirm(&done.provisional_id);
        let updated = state
            .stores
            .get(participant_id)
            .and_then(|s| s.get(&done.message_id))
            .cloned();
        if let Some(updated) = updated {
            state
                .summaries
                .replace_last_message(participant_id, &done.provisional_id, &updated);
        }
        info!(
            participant_id = %participant_id,
            provisional_id = %done.provisional_id,
            id = %done.message_id,
            "Send confirmed by echo"
        );
        self.emitter.emit(SyncEvent::message_reconciled(
            participant_id,
            &done.provisional_id,
            &done.message_id,
        ));
    }

    // =========================================================================
    // Timeouts
    // =========================================================================

    /// Mark every send past its deadline FAILED. Returns how many expired.
    pub async fn sweep_pending_timeouts(&self) -> usize {
        let mut state = self.state.lock().await;
        let expired = state.reconciler.take_expired(self.clock.now());
        if expired.is_empty() {
            return 0;
        }

        for pending in &expired {
            let updated = state.stores.get_mut(&pending.participant_id).and_then(|store| {
                store.set_delivery_state(&pending.provisional_id, DeliveryState::Failed);
                store.get(&pending.provisional_id).cloned()
            });
            if let Some(updated) = updated {
                state.summaries.replace_last_message(
                    &pending.participant_id,
                    &pending.provisional_id,
                    &updated,
                );
            }
            warn!(
                participant_id = %pending.participant_id,
                provisional_id = %pending.provisional_id,
                "Send timed out"
            );
            self.emitter.emit(SyncEvent::send_timed_out(
                &pending.participant_id,
                &pending.provisional_id,
                &pending.body,
            ));
        }
        self.publish(&state);
        expired.len()
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    /// Subscribe to the transport and apply payloads in arrival order until
    /// shutdown or until the transport closes the subscription.
    pub fn spawn_live_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let token = self.cancel.child_token();
        let mut subscription = self.transport.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    next = subscription.recv() => match next {
                        Some(raw) => {
                            engine.handle_live_event(&raw).await;
                        }
                        None => {
                            debug!("Live subscription closed");
                            break;
                        }
                    },
                }
            }
        })
    }

    /// Periodically run [`Self::sweep_pending_timeouts`] until shutdown.
    pub fn spawn_timeout_watchdog(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let token = self.cancel.child_token();
        let period = self.settings.timeout_sweep_interval();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        engine.sweep_pending_timeouts().await;
                    }
                }
            }
        })
    }

    /// Stop background tasks.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn publish(&self, state: &EngineState) {
        self.view_tx.send_replace(state.view());
    }
}
