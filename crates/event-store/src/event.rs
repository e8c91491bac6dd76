use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::retry::{RetryPolicy, to_chrono};
use crate::{ContextId, EventStoreError, Result};

/// Ceiling applied to `max_retry` when a writer does not set one.
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// Type version stamped on events built without an explicit one.
pub const DEFAULT_TYPE_VERSION: &str = "0.0.1";

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EventId> for Uuid {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// Bounded context that produced an event, used to route it to a processor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventOrigin(String);

impl EventOrigin {
    pub const ACCOUNT: &'static str = "account";
    pub const CUSTOMER: &'static str = "customer";

    pub fn new(origin: impl Into<String>) -> Self {
        Self(origin.into())
    }

    pub fn account() -> Self {
        Self::new(Self::ACCOUNT)
    }

    pub fn customer() -> Self {
        Self::new(Self::CUSTOMER)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventOrigin {
    fn from(origin: &str) -> Self {
        Self::new(origin)
    }
}

/// Processing state of an event.
///
/// State transitions:
/// ```text
/// Ready ──► Processing ──┬──► Completed
///   ▲  │        │        ├──► Failed
///   └──┴────────┘        ├──► Aborted
///   (retry < max)        └──► Unprocessable
/// ```
/// Every state except `Ready` and `Processing` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventState {
    /// Waiting for its `scheduled_at` to pass.
    #[default]
    Ready,

    /// Claimed by a worker.
    Processing,

    /// Effect applied (terminal).
    Completed,

    /// Retries exhausted or a non-retryable domain violation (terminal).
    Failed,

    /// Cancelled by an operator (terminal).
    Aborted,

    /// No processor recognises the event type (terminal).
    Unprocessable,
}

impl EventState {
    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventState::Ready | EventState::Processing)
    }

    /// Returns the persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::Ready => "ready",
            EventState::Processing => "processing",
            EventState::Completed => "completed",
            EventState::Failed => "failed",
            EventState::Aborted => "aborted",
            EventState::Unprocessable => "unprocessable",
        }
    }
}

impl std::fmt::Display for EventState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventState {
    type Err = EventStoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ready" => Ok(EventState::Ready),
            "processing" => Ok(EventState::Processing),
            "completed" => Ok(EventState::Completed),
            "failed" => Ok(EventState::Failed),
            "aborted" => Ok(EventState::Aborted),
            "unprocessable" => Ok(EventState::Unprocessable),
            other => Err(EventStoreError::InvalidRecord(format!(
                "unknown event state '{other}'"
            ))),
        }
    }
}

/// A lifecycle command, reported back in [`EventStoreError::InvalidTransition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Complete,
    Retry,
    Force(EventState),
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleAction::Start => f.write_str("start"),
            LifecycleAction::Complete => f.write_str("complete"),
            LifecycleAction::Retry => f.write_str("retry"),
            LifecycleAction::Force(state) => write!(f, "force state {state}"),
        }
    }
}

/// Whether a lifecycle command changed the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The event already was in the requested terminal state.
    Unchanged,
}

/// A persisted domain event together with its processing lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,

    /// The aggregate instance this event describes.
    pub context_id: ContextId,

    pub origin: EventOrigin,

    /// Fine-grained event kind, e.g. `account.funds.withdrawn`.
    #[serde(rename = "type")]
    pub event_type: String,

    pub type_version: String,

    pub state: EventState,

    pub created_at: DateTime<Utc>,

    /// Earliest time the event may be picked up.
    pub scheduled_at: DateTime<Utc>,

    pub started_at: Option<DateTime<Utc>>,

    /// Set exactly when `state` is terminal.
    pub completed_at: Option<DateTime<Utc>>,

    /// Processing attempts that ended in a retryable failure.
    pub retry: u32,

    pub max_retry: u32,

    /// Opaque payload, JSON for every built-in event type.
    pub data: Vec<u8>,
}

impl Event {
    /// Creates a new event builder.
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }

    /// Returns true if the event is `ready` and due at `now`.
    pub fn is_processable(&self, now: DateTime<Utc>) -> bool {
        self.state == EventState::Ready && self.scheduled_at <= now
    }

    /// Returns true if a worker may claim the event at `now`.
    ///
    /// Besides processable events this covers `processing` events whose claim
    /// started before `stale_before`, i.e. whose worker never reported back.
    pub fn is_claimable(&self, now: DateTime<Utc>, stale_before: DateTime<Utc>) -> bool {
        if self.is_processable(now) {
            return true;
        }
        self.state == EventState::Processing
            && self.started_at.is_none_or(|started| started <= stale_before)
    }

    /// `ready → processing`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<Transition> {
        if self.state != EventState::Ready {
            return Err(self.invalid(LifecycleAction::Start));
        }
        self.state = EventState::Processing;
        self.started_at = Some(now);
        Ok(Transition::Applied)
    }

    /// Marks a claimed event as processing, whether it was ready or an abandoned claim.
    ///
    /// Taking over an abandoned claim counts as a failed attempt: `retry` goes
    /// up by one and an event reaching `max_retry` is failed instead of
    /// claimed. Returns whether the event is now claimed.
    pub(crate) fn claim(&mut self, now: DateTime<Utc>) -> bool {
        if self.state == EventState::Processing {
            if self.retry < self.max_retry {
                self.retry += 1;
            }
            if self.retry >= self.max_retry {
                self.state = EventState::Failed;
                self.completed_at = Some(now);
                return false;
            }
        }
        self.state = EventState::Processing;
        self.started_at = Some(now);
        true
    }

    /// `ready | processing → completed`. Completing a completed event is a no-op.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<Transition> {
        match self.state {
            EventState::Ready | EventState::Processing => {
                self.state = EventState::Completed;
                self.completed_at = Some(now);
                Ok(Transition::Applied)
            }
            EventState::Completed => Ok(Transition::Unchanged),
            _ => Err(self.invalid(LifecycleAction::Complete)),
        }
    }

    /// Records a retryable failure.
    ///
    /// Below the ceiling the event goes back to `ready` and `scheduled_at`
    /// moves strictly forward by the policy's delay for the new retry count.
    /// Reaching the ceiling fails the event and leaves `scheduled_at` alone.
    pub fn retry(&mut self, now: DateTime<Utc>, policy: &RetryPolicy) -> Result<Transition> {
        if self.state.is_terminal() {
            return Err(self.invalid(LifecycleAction::Retry));
        }

        if self.retry < self.max_retry {
            self.retry += 1;
        }

        if self.retry < self.max_retry {
            let base = self.scheduled_at.max(now);
            let delay = to_chrono(policy.delay_for_retry(self.retry));
            self.state = EventState::Ready;
            self.scheduled_at = base
                .checked_add_signed(delay)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
        } else {
            self.state = EventState::Failed;
            self.completed_at = Some(now);
        }
        Ok(Transition::Applied)
    }

    /// Moves a live event into the given terminal state without touching
    /// `retry` or `scheduled_at`.
    pub fn force_state(&mut self, target: EventState, now: DateTime<Utc>) -> Result<Transition> {
        if !target.is_terminal() {
            return Err(self.invalid(LifecycleAction::Force(target)));
        }
        if self.state == target {
            return Ok(Transition::Unchanged);
        }
        if self.state.is_terminal() {
            return Err(self.invalid(LifecycleAction::Force(target)));
        }
        self.state = target;
        self.completed_at = Some(now);
        Ok(Transition::Applied)
    }

    fn invalid(&self, action: LifecycleAction) -> EventStoreError {
        EventStoreError::InvalidTransition {
            id: self.id,
            from: self.state,
            action,
        }
    }
}

/// Builder for new `ready` events.
#[derive(Debug, Default)]
pub struct EventBuilder {
    id: Option<EventId>,
    context_id: Option<ContextId>,
    origin: Option<EventOrigin>,
    event_type: Option<String>,
    type_version: Option<String>,
    created_at: Option<DateTime<Utc>>,
    scheduled_at: Option<DateTime<Utc>>,
    max_retry: Option<u32>,
    data: Vec<u8>,
}

impl EventBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn context_id(mut self, id: ContextId) -> Self {
        self.context_id = Some(id);
        self
    }

    pub fn origin(mut self, origin: impl Into<EventOrigin>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn type_version(mut self, version: impl Into<String>) -> Self {
        self.type_version = Some(version.into());
        self
    }

    /// Sets the creation time. If not set, the current time will be used.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Sets the first eligible pickup time. Defaults to the creation time.
    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = Some(max_retry);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(
        mut self,
        payload: &T,
    ) -> std::result::Result<Self, serde_json::Error> {
        self.data = serde_json::to_vec(payload)?;
        Ok(self)
    }

    /// Sets the payload from raw bytes.
    pub fn data_raw(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Builds the event, returning None if context ID, origin or type are missing.
    pub fn try_build(self) -> Option<Event> {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        Some(Event {
            id: self.id.unwrap_or_default(),
            context_id: self.context_id?,
            origin: self.origin?,
            event_type: self.event_type?,
            type_version: self
                .type_version
                .unwrap_or_else(|| DEFAULT_TYPE_VERSION.to_string()),
            state: EventState::Ready,
            created_at,
            scheduled_at: self.scheduled_at.unwrap_or(created_at),
            started_at: None,
            completed_at: None,
            retry: 0,
            max_retry: self.max_retry.unwrap_or(DEFAULT_MAX_RETRY),
            data: self.data,
        })
    }

    /// Builds the event.
    ///
    /// # Panics
    ///
    /// Panics if context ID, origin or event type are not set.
    pub fn build(self) -> Event {
        self.try_build()
            .expect("context_id, origin and event_type are required")
    }
}
