use crate::{ContextId, EventOrigin, EventState};

/// Builder for constructing diagnostic event queries.
///
/// Results are ordered by `scheduled_at`, then `created_at`.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Filter by origin.
    pub origin: Option<EventOrigin>,

    /// Filter by lifecycle state.
    pub state: Option<EventState>,

    /// Filter by event type.
    pub event_type: Option<String>,

    /// Filter by the aggregate instance the events describe.
    pub context_id: Option<ContextId>,

    /// Maximum number of events to return.
    pub limit: Option<usize>,
}

impl EventQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one origin in one state.
    pub fn for_origin_and_state(origin: EventOrigin, state: EventState) -> Self {
        Self {
            origin: Some(origin),
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn origin(mut self, origin: EventOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn state(mut self, state: EventState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn context_id(mut self, id: ContextId) -> Self {
        self.context_id = Some(id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the event passes every filter (the limit is not considered).
    pub fn matches(&self, event: &crate::Event) -> bool {
        if let Some(ref origin) = self.origin
            && &event.origin != origin
        {
            return false;
        }
        if let Some(state) = self.state
            && event.state != state
        {
            return false;
        }
        if let Some(ref event_type) = self.event_type
            && &event.event_type != event_type
        {
            return false;
        }
        if let Some(context_id) = self.context_id
            && event.context_id != context_id
        {
            return false;
        }
        true
    }
}
