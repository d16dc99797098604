#![doc = include_str!("../README.md")]

pub mod domain;
pub mod errors;
pub mod events;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    ContentKey, ConversationFilters, ConversationSummary, DeliveryState, HistoryPage, Message,
    MessageKey, MessageType, NormalizeError, PageCursor, PaginationState, Participant,
    ParticipantRole, identify, is_provisional_id, normalize_body, normalize_payload,
};
pub use errors::SendError;
pub use events::{PaginationView, SyncEvent, ViewState};
pub use ports::{
    Clock, ConversationListError, ConversationListPort, FallbackSendPort, HistoryError,
    HistoryPort, LiveSubscription, NoopEmitter, SyncError, SyncEventEmitter, SystemClock,
    TransportError, TransportPort,
};
pub use settings::{SettingsError, SettingsUpdate, SyncSettings, validate_settings};
