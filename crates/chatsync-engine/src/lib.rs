#![doc = include_str!("../README.md")]

// Re-export core types for convenience
pub use chatsync_core::domain::{Message, Participant};
pub use chatsync_core::events::{SyncEvent, ViewState};
pub use chatsync_core::ports::SyncError;
pub use chatsync_core::settings::SyncSettings;

// Pure state machines (no I/O, no locking)
pub mod dedup;
pub mod optimistic;
pub mod pagination;
pub mod store;
pub mod summaries;

pub use dedup::{Classification, Deduplicator};
pub use optimistic::{OptimisticSendReconciler, PendingSend};
pub use pagination::{PageRequest, PaginationController, RequestKind, StaleResponse};
pub use store::{ConversationStore, PrependOutcome, Reconciled, SeedOutcome};
pub use summaries::ConversationListSynchronizer;

// Orchestrator
mod engine;

pub use engine::{LiveOutcome, SyncEngine, SyncEngineDeps};

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
