//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define what the sync engine expects from the outside world. They use
//! only domain types; HTTP, socket and UI details stay in the adapters.
//!
//! # Design Rules
//!
//! - No `reqwest` or socket types in any signature
//! - Each port has its own error enum
//! - Async where the call does I/O, sync where it is fire-and-forget

pub mod clock;
pub mod conversation_list;
pub mod event_emitter;
pub mod history;
pub mod transport;

use thiserror::Error;

pub use clock::{Clock, SystemClock};
pub use conversation_list::{ConversationListError, ConversationListPort};
pub use event_emitter::{NoopEmitter, SyncEventEmitter};
pub use history::{HistoryError, HistoryPort};
pub use transport::{FallbackSendPort, LiveSubscription, TransportError, TransportPort};

use crate::errors::SendError;
use crate::settings::SettingsError;

/// Canonical error type for engine operations.
///
/// Adapters map this to their own surface (exit codes, UI toasts).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching a history page failed.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Fetching the conversation list failed.
    #[error(transparent)]
    ConversationList(#[from] ConversationListError),

    /// A send could not be completed.
    #[error(transparent)]
    Send(#[from] SendError),

    #[error("No active conversation")]
    NoActiveConversation,

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
