//! `chatsync replay`: drive a scripted session through the engine.
//!
//! All ports are in-memory and the clock only moves on `advance` steps, so
//! a script always produces the same report.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use chatsync_core::{
    Clock, ConversationSummary, DeliveryState, SyncSettings, TransportError, ViewState,
    normalize_payload, validate_settings,
};
use chatsync_engine::testing::{
    InMemoryConversationList, InMemoryFallback, InMemoryHistory, LoopbackTransport, ManualClock,
    RecordingEmitter,
};
use chatsync_engine::{LiveOutcome, SyncEngine, SyncEngineDeps};

use crate::error::CliError;
use crate::presentation::{delivery_label, to_json};
use crate::script::{Script, Step, refresh_filters};

/// Outcome of one step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub ok: bool,
    pub detail: String,
}

/// Everything a replay produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub steps: Vec<StepReport>,
    pub events: Vec<&'static str>,
    pub view: ViewState,
}

/// The engine wired to in-memory ports the script can poke at.
pub struct ReplaySession {
    engine: SyncEngine,
    transport: Arc<LoopbackTransport>,
    fallback: Arc<InMemoryFallback>,
    emitter: RecordingEmitter,
    clock: Arc<ManualClock>,
}

impl ReplaySession {
    /// Seed the ports from `script` and build the engine.
    pub async fn new(script: &Script, settings: SyncSettings) -> Result<Self, CliError> {
        let clock = Arc::new(ManualClock::new(script.start()));
        let history = Arc::new(InMemoryHistory::new());
        let conversations = Arc::new(InMemoryConversationList::new());
        let transport = Arc::new(LoopbackTransport::new());
        let fallback = Arc::new(InMemoryFallback::new(clock.clone()));
        let emitter = RecordingEmitter::new();

        for (participant_id, payloads) in &script.history {
            let messages = payloads
                .iter()
                .map(|raw| normalize_payload(raw, script.start()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CliError::Script(format!("history for {participant_id}: {e}")))?;
            history.insert_history(participant_id, messages);
        }

        let summaries: Vec<ConversationSummary> = script
            .summaries
            .iter()
            .map(|p| ConversationSummary::empty(p.to_participant()))
            .collect();
        conversations.set(summaries.clone());

        let engine = SyncEngine::new(SyncEngineDeps {
            current_user_id: script.user.clone(),
            history,
            transport: transport.clone(),
            fallback: fallback.clone(),
            conversations,
            emitter: Arc::new(emitter.clone()),
            clock: clock.clone(),
            settings,
        });
        engine.seed_summaries(summaries).await;

        Ok(Self {
            engine,
            transport,
            fallback,
            emitter,
            clock,
        })
    }

    pub const fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Run one step, returning a short description of what happened.
    pub async fn run_step(&self, step: &Step) -> Result<String, CliError> {
        let engine = &self.engine;
        match step {
            Step::Select { participant } => {
                engine.select_conversation(participant).await?;
                Ok(format!("{} messages", engine.view().messages.len()))
            }
            Step::LoadOlder => {
                engine.load_older_messages().await?;
                let view = engine.view();
                Ok(format!(
                    "page {}, {} messages",
                    view.pagination.page,
                    view.messages.len()
                ))
            }
            Step::Send { body } => {
                let message = engine.send_message(body).await?;
                Ok(format!(
                    "{} {}",
                    message.id,
                    delivery_label(message.delivery_state)
                ))
            }
            Step::Live { payload } => Ok(describe_live(engine.handle_live_event(payload).await)),
            Step::Echo { id } => {
                let payload = self.echo_payload(id)?;
                Ok(describe_live(engine.handle_live_event(&payload).await))
            }
            Step::Advance { ms } => {
                self.clock.advance_ms(*ms);
                Ok(format!("now {}", self.now_rfc3339()))
            }
            Step::Sweep => {
                let failed = engine.sweep_pending_timeouts().await;
                Ok(format!("{failed} timed out"))
            }
            Step::Connect { connected } => {
                self.transport.set_connected(*connected);
                Ok(if *connected { "online" } else { "offline" }.to_string())
            }
            Step::FailFallback { reason } => {
                match reason {
                    Some(reason) => self
                        .fallback
                        .fail_with(TransportError::Fallback(reason.clone())),
                    None => self.fallback.recover(),
                }
                Ok(reason.as_deref().unwrap_or("recovered").to_string())
            }
            Step::Retry => {
                let id = self.last_failed_id()?;
                let message = engine.retry_failed(&id).await?;
                Ok(format!(
                    "{id} -> {} {}",
                    message.id,
                    delivery_label(message.delivery_state)
                ))
            }
            Step::Discard => {
                let id = self.last_failed_id()?;
                let body = engine.discard_failed(&id).await?;
                Ok(format!("{id} restored {body:?}"))
            }
            Step::Refresh {
                role,
                search,
                unread_only,
            } => {
                let filters = refresh_filters(role.as_deref(), search.as_deref(), *unread_only);
                let n = engine.refresh_summaries(&filters).await?;
                Ok(format!("{n} conversations"))
            }
            Step::Close { participant } => {
                engine.close_conversation(participant).await;
                Ok(format!("closed {participant}"))
            }
        }
    }

    fn now_rfc3339(&self) -> String {
        self.clock.now().to_rfc3339()
    }

    /// The most recent live send, as the server would echo it.
    fn echo_payload(&self, id: &str) -> Result<Value, CliError> {
        let (from, to, body) = self.transport.sent().pop().ok_or_else(|| {
            CliError::Arguments("nothing has been sent over the live transport".to_string())
        })?;
        Ok(json!({
            "id": id,
            "fromId": from,
            "toId": to,
            "body": body,
            "createdAt": self.now_rfc3339(),
        }))
    }

    fn last_failed_id(&self) -> Result<String, CliError> {
        self.engine
            .view()
            .messages
            .iter()
            .rev()
            .find(|m| m.delivery_state == DeliveryState::Failed)
            .map(|m| m.id.clone())
            .ok_or_else(|| CliError::Arguments("no failed message to act on".to_string()))
    }

    /// Run every step. Failed steps are recorded and the replay continues.
    pub async fn run(&self, steps: &[Step]) -> ReplayReport {
        let mut reports = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let (ok, detail) = match self.run_step(step).await {
                Ok(detail) => (true, detail),
                Err(e) => {
                    warn!(index, op = step.name(), error = %e, "Step failed");
                    (false, e.to_string())
                }
            };
            debug!(index, op = step.name(), %detail, "Step finished");
            reports.push(StepReport {
                index,
                op: step.name(),
                ok,
                detail,
            });
        }

        ReplayReport {
            steps: reports,
            events: self.emitter.names(),
            view: self.engine.view(),
        }
    }
}

fn describe_live(outcome: LiveOutcome) -> String {
    match outcome {
        LiveOutcome::Rejected => "rejected".to_string(),
        LiveOutcome::Accepted {
            participant_id,
            classification,
        } => format!("{participant_id}: {classification:?}"),
    }
}

/// Replay a parsed script with explicit settings.
pub async fn replay(script: &Script, settings: SyncSettings) -> Result<ReplayReport, CliError> {
    let session = ReplaySession::new(script, settings).await?;
    let report = session.run(&script.steps).await;
    session.engine().shutdown();
    Ok(report)
}

/// Entry point for the `replay` subcommand.
pub async fn execute(path: &Path, compact: bool) -> Result<(), CliError> {
    let script = Script::load(path)?;
    let settings = match &script.settings {
        Some(settings) => {
            validate_settings(settings)?;
            settings.clone()
        }
        None => SyncSettings::from_env()?,
    };

    info!(script = %path.display(), steps = script.steps.len(), "Replaying session");
    let report = replay(&script, settings).await?;
    println!("{}", to_json(&report, compact)?);
    Ok(())
}
