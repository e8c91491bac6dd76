//! Processor error types.

use thiserror::Error;

use crate::codec::DecodeError;

/// Errors returned by event processors.
///
/// Domain repository failures never surface here: processors translate them
/// into lifecycle calls on the gateway. What remains are gateway failures
/// while recording the outcome and payloads that cannot be decoded.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// The event payload could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Unknown decode failure policy: {0}")]
    UnknownPolicy(String),
}

/// Result type for processor operations.
pub type Result<T> = std::result::Result<T, ProcessorError>;
