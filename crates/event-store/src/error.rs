use thiserror::Error;

use crate::event::{EventId, EventState, LifecycleAction};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// No event exists with the given ID.
    #[error("Event not found: {0}")]
    NotFound(EventId),

    /// The requested lifecycle change is not allowed from the event's current state.
    #[error("Invalid transition for event {id}: cannot {action} from state {from}")]
    InvalidTransition {
        id: EventId,
        from: EventState,
        action: LifecycleAction,
    },

    /// A stored record could not be mapped onto an [`Event`](crate::Event).
    #[error("Invalid event record: {0}")]
    InvalidRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
