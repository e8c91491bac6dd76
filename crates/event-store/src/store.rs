use std::time::Duration;

use async_trait::async_trait;

use crate::{Event, EventId, EventOrigin, EventQuery, EventState, Result};

/// Gateway over the durable event table.
///
/// Queries never mutate. Commands drive the lifecycle described on
/// [`EventState`] and return [`NotFound`](crate::EventStoreError::NotFound)
/// for unknown IDs. Storage errors are propagated unchanged; retrying the
/// gateway call itself is the caller's decision.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Returns up to `limit` events that are `ready` with `scheduled_at <= now`,
    /// oldest schedule first.
    ///
    /// This is a plain read: two workers may see the same event. Use
    /// [`claim_processable`](Self::claim_processable) to hand events to workers.
    async fn fetch_processable(&self, limit: usize) -> Result<Vec<Event>>;

    /// Atomically selects up to `limit` claimable events and moves them to
    /// `processing` with `started_at = now`.
    ///
    /// Claimable are processable events plus `processing` events whose claim is
    /// older than `lease`, so a crashed worker's events are picked up again.
    async fn claim_processable(&self, limit: usize, lease: Duration) -> Result<Vec<Event>>;

    /// Retrieves events matching a query.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<Event>>;

    /// Retrieves one event.
    async fn fetch_by_id(&self, id: EventId) -> Result<Event>;

    /// `ready → processing`, sets `started_at`.
    async fn mark_started(&self, id: EventId) -> Result<()>;

    /// `→ completed`, sets `completed_at`. A no-op on an already completed event.
    async fn mark_completed(&self, id: EventId) -> Result<()>;

    /// Increments `retry` and either reschedules the event with backoff or,
    /// at the ceiling, fails it.
    async fn mark_retry(&self, id: EventId) -> Result<()>;

    /// Moves a live event into a terminal state without touching `retry` or
    /// `scheduled_at`.
    async fn force_state(&self, id: EventId, state: EventState) -> Result<()>;
}

/// Extension trait providing convenience queries.
#[async_trait]
pub trait EventRepositoryExt: EventRepository {
    /// Returns up to `limit` events of one origin in one state.
    async fn fetch_by_origin_and_state(
        &self,
        origin: &EventOrigin,
        state: EventState,
        limit: usize,
    ) -> Result<Vec<Event>> {
        self.query_events(EventQuery::for_origin_and_state(origin.clone(), state).limit(limit))
            .await
    }

    /// Returns every stored event.
    async fn fetch_all(&self) -> Result<Vec<Event>> {
        self.query_events(EventQuery::new()).await
    }
}

// Blanket implementation for all EventRepository implementations
impl<T: EventRepository + ?Sized> EventRepositoryExt for T {}
