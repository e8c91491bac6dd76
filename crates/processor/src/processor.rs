//! The per-origin processor trait and the outcome bookkeeping shared by processors.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use domain::ErrorKind;
use event_store::{Event, EventRepository, EventState};

use crate::codec::{DecodeError, EventCodec};
use crate::{ProcessorError, Result};

/// Applies the events of one origin and records their outcome on the gateway.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    /// Returns the origin this processor handles.
    fn origin(&self) -> &str;

    /// Processes a single event.
    ///
    /// Returns the lifecycle call made on the gateway. Gateway failures and
    /// undecodable payloads are returned as errors.
    async fn process(&self, event: &Event) -> Result<ProcessOutcome>;
}

/// The lifecycle call a processor made for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessOutcome {
    /// `mark_completed` was called.
    Completed,
    /// `force_state(failed)` was called.
    Failed,
    /// `mark_retry` was called. The event may have exhausted its retries.
    Retried,
    /// `force_state(unprocessable)` was called.
    Unprocessable,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Completed => "completed",
            ProcessOutcome::Failed => "failed",
            ProcessOutcome::Retried => "retried",
            ProcessOutcome::Unprocessable => "unprocessable",
        }
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with an event whose payload cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeFailurePolicy {
    /// Force the event to `failed`. A malformed payload never decodes.
    #[default]
    MarkFailed,
    /// Leave the lifecycle untouched and let the caller decide.
    LeaveUnchanged,
}

impl FromStr for DecodeFailurePolicy {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mark_failed" => Ok(DecodeFailurePolicy::MarkFailed),
            "leave_unchanged" => Ok(DecodeFailurePolicy::LeaveUnchanged),
            other => Err(ProcessorError::UnknownPolicy(other.to_string())),
        }
    }
}

/// How a domain repository result maps onto the event lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Complete,
    Fail,
    Retry,
}

impl Disposition {
    /// Creation: an existing entity means an earlier attempt already succeeded.
    pub(crate) fn for_create(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::AlreadyExists => Disposition::Complete,
            ErrorKind::Invalid => Disposition::Fail,
            ErrorKind::NotFound
            | ErrorKind::InsufficientFunds
            | ErrorKind::Blocked
            | ErrorKind::Unavailable => Disposition::Retry,
        }
    }

    /// Balance changes: domain violations do not go away by retrying.
    pub(crate) fn for_funds(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InsufficientFunds
            | ErrorKind::NotFound
            | ErrorKind::Blocked
            | ErrorKind::Invalid => Disposition::Fail,
            ErrorKind::AlreadyExists | ErrorKind::Unavailable => Disposition::Retry,
        }
    }

    /// Status changes on an existing entity.
    pub(crate) fn for_status(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound | ErrorKind::Invalid => Disposition::Fail,
            ErrorKind::AlreadyExists
            | ErrorKind::InsufficientFunds
            | ErrorKind::Blocked
            | ErrorKind::Unavailable => Disposition::Retry,
        }
    }

    /// Classifies a domain repository result.
    pub(crate) fn classify(
        event: &Event,
        result: domain::Result<()>,
        on_error: fn(ErrorKind) -> Disposition,
    ) -> Self {
        match result {
            Ok(()) => Disposition::Complete,
            Err(err) => {
                let disposition = on_error(err.kind());
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %err,
                    ?disposition,
                    "domain repository rejected event"
                );
                disposition
            }
        }
    }
}

/// Records `disposition` on the gateway.
pub(crate) async fn record<R>(
    gateway: &R,
    event: &Event,
    disposition: Disposition,
) -> Result<ProcessOutcome>
where
    R: EventRepository + ?Sized,
{
    let outcome = match disposition {
        Disposition::Complete => {
            gateway.mark_completed(event.id).await?;
            ProcessOutcome::Completed
        }
        Disposition::Fail => {
            gateway.force_state(event.id, EventState::Failed).await?;
            ProcessOutcome::Failed
        }
        Disposition::Retry => {
            gateway.mark_retry(event.id).await?;
            ProcessOutcome::Retried
        }
    };

    metrics::counter!("events_processed_total", "outcome" => outcome.as_str()).increment(1);
    Ok(outcome)
}

/// Forces an event nobody can handle to `unprocessable`.
pub(crate) async fn reject_unprocessable<R>(gateway: &R, event: &Event) -> Result<ProcessOutcome>
where
    R: EventRepository + ?Sized,
{
    tracing::warn!(
        event_id = %event.id,
        origin = %event.origin,
        event_type = %event.event_type,
        "unprocessable event"
    );
    gateway
        .force_state(event.id, EventState::Unprocessable)
        .await?;

    let outcome = ProcessOutcome::Unprocessable;
    metrics::counter!("events_processed_total", "outcome" => outcome.as_str()).increment(1);
    Ok(outcome)
}

/// Decodes the payload of `event`.
///
/// Returns `Ok(None)` once an event with an unregistered type has been forced
/// to `unprocessable`. A malformed payload is handled per `policy` and then
/// returned as an error.
pub(crate) async fn decode<T, R>(
    gateway: &R,
    codec: &EventCodec<T>,
    policy: DecodeFailurePolicy,
    event: &Event,
) -> Result<Option<T>>
where
    T: 'static,
    R: EventRepository + ?Sized,
{
    match codec.decode(&event.event_type, &event.data) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(DecodeError::UnknownType(_)) => {
            reject_unprocessable(gateway, event).await?;
            Ok(None)
        }
        Err(err) => {
            tracing::error!(event_id = %event.id, error = %err, ?policy, "undecodable event");
            metrics::counter!("events_processed_total", "outcome" => "undecodable").increment(1);
            if policy == DecodeFailurePolicy::MarkFailed {
                gateway.force_state(event.id, EventState::Failed).await?;
            }
            Err(err.into())
        }
    }
}
