//! Composition root for the commands that talk to a backend.
//!
//! The REST client serves history, the conversation list and sends. There
//! is no socket client, so the live transport is always offline and every
//! send takes the REST fallback.

use std::sync::Arc;
use std::time::Duration;

use chatsync_core::{
    LiveSubscription, NoopEmitter, SyncSettings, SystemClock, TransportError, TransportPort,
};
use chatsync_engine::{SyncEngine, SyncEngineDeps};
use chatsync_http::{DefaultRestClient, RestClientConfig};
use tracing::debug;

use crate::commands::RemoteArgs;
use crate::error::CliError;

/// Live transport for a process without a socket connection.
pub struct OfflineTransport;

impl TransportPort for OfflineTransport {
    fn send(&self, _from_id: &str, _to_id: &str, _body: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    fn subscribe(&self) -> LiveSubscription {
        // Sender dropped immediately: the subscription ends at once.
        LiveSubscription::channel().1
    }
}

pub fn client_config(args: &RemoteArgs) -> RestClientConfig {
    RestClientConfig::new()
        .with_base_url(&args.base_url)
        .with_optional_token(args.token.clone())
        .with_timeout(Duration::from_secs(args.timeout_secs))
}

/// Build an engine backed by the REST API described by `args`.
pub fn bootstrap(args: &RemoteArgs, settings: SyncSettings) -> Result<SyncEngine, CliError> {
    if args.user.trim().is_empty() {
        return Err(CliError::Arguments("--user must not be empty".to_string()));
    }

    let client = Arc::new(DefaultRestClient::new(&client_config(args))?);
    debug!(base_url = %args.base_url, user = %args.user, "REST client ready");

    Ok(SyncEngine::new(SyncEngineDeps {
        current_user_id: args.user.clone(),
        history: client.clone(),
        transport: Arc::new(OfflineTransport),
        fallback: client.clone(),
        conversations: client,
        emitter: Arc::new(NoopEmitter::new()),
        clock: Arc::new(SystemClock),
        settings,
    }))
}
