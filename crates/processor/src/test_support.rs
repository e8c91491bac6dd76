//! Recording gateway used by the processor unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use event_store::{
    Event, EventId, EventQuery, EventRepository, EventState, EventStoreError,
    InMemoryEventRepository, Result,
};
use tokio::sync::Mutex;

/// A lifecycle command received by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Started(EventId),
    Completed(EventId),
    Retry(EventId),
    Force(EventId, EventState),
}

/// Wraps the in-memory gateway and records every lifecycle command.
#[derive(Clone, Default)]
pub(crate) struct RecordingGateway {
    pub(crate) inner: InMemoryEventRepository,
    calls: Arc<Mutex<Vec<Call>>>,
    fail_commands: Arc<AtomicBool>,
}

impl RecordingGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    /// Makes every lifecycle command fail after being recorded.
    pub(crate) fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    async fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().await.push(call);
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(EventStoreError::InvalidRecord(
                "injected gateway failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EventRepository for RecordingGateway {
    async fn fetch_processable(&self, limit: usize) -> Result<Vec<Event>> {
        self.inner.fetch_processable(limit).await
    }

    async fn claim_processable(&self, limit: usize, lease: Duration) -> Result<Vec<Event>> {
        self.inner.claim_processable(limit, lease).await
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<Event>> {
        self.inner.query_events(query).await
    }

    async fn fetch_by_id(&self, id: EventId) -> Result<Event> {
        self.inner.fetch_by_id(id).await
    }

    async fn mark_started(&self, id: EventId) -> Result<()> {
        self.record(Call::Started(id)).await?;
        self.inner.mark_started(id).await
    }

    async fn mark_completed(&self, id: EventId) -> Result<()> {
        self.record(Call::Completed(id)).await?;
        self.inner.mark_completed(id).await
    }

    async fn mark_retry(&self, id: EventId) -> Result<()> {
        self.record(Call::Retry(id)).await?;
        self.inner.mark_retry(id).await
    }

    async fn force_state(&self, id: EventId, state: EventState) -> Result<()> {
        self.record(Call::Force(id, state)).await?;
        self.inner.force_state(id, state).await
    }
}
