//! Event emitter trait for sync events.
//!
//! Implementations handle delivery (channels, UI bridges, logging).

use crate::events::SyncEvent;

/// Trait for emitting discrete sync events.
///
/// Continuous state goes through the engine's view-state channel; this is
/// for things that happened once (a send failed, a page arrived).
///
/// # Implementations
///
/// - `NoopEmitter` - for tests and contexts without a listener
/// - `RecordingEmitter` in `chatsync-engine` test utilities
pub trait SyncEventEmitter: Send + Sync {
    /// Emit a sync event. Must not block.
    fn emit(&self, event: SyncEvent);

    /// Clone this emitter into a boxed trait object.
    fn clone_box(&self) -> Box<dyn SyncEventEmitter>;
}

/// An event emitter that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub const fn new() -> Self {
        Self
    }
}

impl SyncEventEmitter for NoopEmitter {
    fn emit(&self, _event: SyncEvent) {}

    fn clone_box(&self) -> Box<dyn SyncEventEmitter> {
        Box::new(self.clone())
    }
}
