//! Worker error types.

use thiserror::Error;

/// Errors that stop the worker or a dispatch cycle.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// An environment variable holds a value that cannot be used.
    #[error("Invalid value for {key}: {value:?}")]
    Config { key: &'static str, value: String },

    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    #[error("Processor error: {0}")]
    Processor(#[from] processor::ProcessorError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Metrics recorder error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// The dispatch loop ended while the worker was still serving.
    #[error("Dispatcher stopped: {0}")]
    DispatcherStopped(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
