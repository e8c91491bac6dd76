use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::retry::to_chrono;
use crate::{
    Event, EventId, EventQuery, EventState, EventStoreError, Result, RetryPolicy, Transition,
    store::EventRepository,
};

/// In-memory event repository for tests and single-process deployments.
///
/// Provides the same lifecycle semantics as the PostgreSQL implementation;
/// every command runs under one write lock, which also makes
/// [`claim_processable`](EventRepository::claim_processable) atomic.
#[derive(Clone, Default)]
pub struct InMemoryEventRepository {
    events: Arc<RwLock<Vec<Event>>>,
    policy: RetryPolicy,
}

impl InMemoryEventRepository {
    /// Creates a new empty repository with the default retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty repository with the given retry policy.
    pub fn with_retry_policy(policy: RetryPolicy) -> Self {
        Self {
            events: Arc::default(),
            policy,
        }
    }

    /// Stores a new event. Fails if an event with the same ID already exists.
    pub async fn insert(&self, event: Event) -> Result<()> {
        let mut events = self.events.write().await;
        if events.iter().any(|e| e.id == event.id) {
            return Err(EventStoreError::InvalidRecord(format!(
                "duplicate event id {}",
                event.id
            )));
        }
        events.push(event);
        Ok(())
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }

    async fn apply<F>(&self, id: EventId, action: F) -> Result<Event>
    where
        F: FnOnce(&mut Event, DateTime<Utc>) -> Result<Transition> + Send,
    {
        let mut events = self.events.write().await;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(EventStoreError::NotFound(id))?;
        action(event, Utc::now())?;
        Ok(event.clone())
    }
}

fn sort_by_schedule(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.scheduled_at
            .cmp(&b.scheduled_at)
            .then(a.created_at.cmp(&b.created_at))
    });
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn fetch_processable(&self, limit: usize) -> Result<Vec<Event>> {
        let now = Utc::now();
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.is_processable(now))
            .cloned()
            .collect();
        sort_by_schedule(&mut events);
        events.truncate(limit);
        Ok(events)
    }

    #[tracing::instrument(skip(self))]
    async fn claim_processable(&self, limit: usize, lease: Duration) -> Result<Vec<Event>> {
        let now = Utc::now();
        let stale_before = now
            .checked_sub_signed(to_chrono(lease))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut store = self.events.write().await;
        let mut candidates: Vec<&mut Event> = store
            .iter_mut()
            .filter(|e| e.is_claimable(now, stale_before))
            .collect();
        candidates.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then(a.created_at.cmp(&b.created_at))
        });

        let mut claimed = Vec::new();
        for event in candidates.into_iter().take(limit) {
            if event.claim(now) {
                claimed.push(event.clone());
            } else {
                tracing::warn!(
                    event_id = %event.id,
                    retry = event.retry,
                    "abandoned claim exhausted retries, event failed"
                );
            }
        }

        metrics::counter!("events_claimed_total").increment(claimed.len() as u64);
        Ok(claimed)
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<Event>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        sort_by_schedule(&mut events);

        if let Some(limit) = query.limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    async fn fetch_by_id(&self, id: EventId) -> Result<Event> {
        let store = self.events.read().await;
        store
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(EventStoreError::NotFound(id))
    }

    #[tracing::instrument(skip(self))]
    async fn mark_started(&self, id: EventId) -> Result<()> {
        self.apply(id, |event, now| event.start(now)).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn mark_completed(&self, id: EventId) -> Result<()> {
        self.apply(id, |event, now| event.complete(now)).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn mark_retry(&self, id: EventId) -> Result<()> {
        let policy = &self.policy;
        let event = self
            .apply(id, |event, now| event.retry(now, policy))
            .await?;

        metrics::counter!("event_store_retries_total").increment(1);
        if event.state == EventState::Failed {
            tracing::warn!(event_id = %id, retry = event.retry, "retries exhausted, event failed");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn force_state(&self, id: EventId, state: EventState) -> Result<()> {
        self.apply(id, |event, now| event.force_state(state, now))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContextId, EventOrigin, EventRepositoryExt};

    fn create_test_event(origin: &str, event_type: &str) -> Event {
        Event::builder()
            .context_id(ContextId::new())
            .origin(origin)
            .event_type(event_type)
            .data_raw(br#"{"test":true}"#.to_vec())
            .build()
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::builder()
            .initial_delay(Duration::from_secs(1))
            .build()
    }

    #[tokio::test]
    async fn insert_and_fetch_by_id() {
        let repo = InMemoryEventRepository::new();
        let event = create_test_event("account", "account.created");
        repo.insert(event.clone()).await.unwrap();

        assert_eq!(repo.event_count().await, 1);
        assert_eq!(repo.fetch_by_id(event.id).await.unwrap(), event);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let repo = InMemoryEventRepository::new();
        let event = create_test_event("account", "account.created");
        repo.insert(event.clone()).await.unwrap();
        assert!(repo.insert(event).await.is_err());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let repo = InMemoryEventRepository::new();
        let id = EventId::new();

        assert!(matches!(
            repo.fetch_by_id(id).await,
            Err(EventStoreError::NotFound(missing)) if missing == id
        ));
        assert!(matches!(
            repo.mark_started(id).await,
            Err(EventStoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.mark_completed(id).await,
            Err(EventStoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.mark_retry(id).await,
            Err(EventStoreError::NotFound(_))
        ));
        assert!(matches!(
            repo.force_state(id, EventState::Aborted).await,
            Err(EventStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn fetch_processable_orders_by_schedule_and_skips_future() {
        let repo = InMemoryEventRepository::new();
        let now = Utc::now();

        let later = Event::builder()
            .context_id(ContextId::new())
            .origin("account")
            .event_type("account.created")
            .scheduled_at(now - chrono::Duration::seconds(10))
            .build();
        let earlier = Event::builder()
            .context_id(ContextId::new())
            .origin("account")
            .event_type("account.created")
            .scheduled_at(now - chrono::Duration::seconds(60))
            .build();
        let future = Event::builder()
            .context_id(ContextId::new())
            .origin("account")
            .event_type("account.created")
            .scheduled_at(now + chrono::Duration::hours(1))
            .build();

        repo.insert(later.clone()).await.unwrap();
        repo.insert(future).await.unwrap();
        repo.insert(earlier.clone()).await.unwrap();

        let ready = repo.fetch_processable(10).await.unwrap();
        let ids: Vec<_> = ready.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);

        let limited = repo.fetch_processable(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, earlier.id);
    }

    #[tokio::test]
    async fn fetch_processable_does_not_claim() {
        let repo = InMemoryEventRepository::new();
        repo.insert(create_test_event("account", "account.created"))
            .await
            .unwrap();

        assert_eq!(repo.fetch_processable(10).await.unwrap().len(), 1);
        assert_eq!(repo.fetch_processable(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_lease_expires() {
        let repo = InMemoryEventRepository::new();
        let event = create_test_event("account", "account.created");
        repo.insert(event.clone()).await.unwrap();

        let lease = Duration::from_secs(300);
        let claimed = repo.claim_processable(10, lease).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].state, EventState::Processing);
        assert!(claimed[0].started_at.is_some());

        assert!(repo.claim_processable(10, lease).await.unwrap().is_empty());
        assert!(repo.fetch_processable(10).await.unwrap().is_empty());

        // An expired lease hands the event out again.
        let reclaimed = repo.claim_processable(10, Duration::ZERO).await.unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].id, event.id);
    }

    #[tokio::test]
    async fn repeated_takeovers_exhaust_retries() {
        let repo = InMemoryEventRepository::new();
        let event = create_test_event("account", "account.created");
        repo.insert(event.clone()).await.unwrap();
        repo.claim_processable(10, Duration::ZERO).await.unwrap();

        for expected in 1..=2 {
            let reclaimed = repo.claim_processable(10, Duration::ZERO).await.unwrap();
            assert_eq!(reclaimed.len(), 1);
            assert_eq!(reclaimed[0].retry, expected);
        }

        assert!(repo.claim_processable(10, Duration::ZERO).await.unwrap().is_empty());
        let stored = repo.fetch_by_id(event.id).await.unwrap();
        assert_eq!(stored.state, EventState::Failed);
        assert_eq!(stored.retry, stored.max_retry);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn concurrent_claims_never_share_an_event() {
        let repo = InMemoryEventRepository::new();
        for _ in 0..20 {
            repo.insert(create_test_event("account", "account.created"))
                .await
                .unwrap();
        }

        let lease = Duration::from_secs(300);
        let (a, b) = tokio::join!(
            repo.claim_processable(15, lease),
            repo.claim_processable(15, lease)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.len() + b.len(), 20);
        assert!(a.iter().all(|x| b.iter().all(|y| x.id != y.id)));
    }

    #[tokio::test]
    async fn mark_started_then_completed() {
        let repo = InMemoryEventRepository::new();
        let event = create_test_event("account", "account.created");
        repo.insert(event.clone()).await.unwrap();

        repo.mark_started(event.id).await.unwrap();
        let started = repo.fetch_by_id(event.id).await.unwrap();
        assert_eq!(started.state, EventState::Processing);
        assert!(started.started_at.is_some());

        repo.mark_completed(event.id).await.unwrap();
        let completed = repo.fetch_by_id(event.id).await.unwrap();
        assert_eq!(completed.state, EventState::Completed);
        assert!(completed.completed_at.is_some());

        // Completing twice is harmless; starting again is not allowed.
        repo.mark_completed(event.id).await.unwrap();
        assert!(matches!(
            repo.mark_started(event.id).await,
            Err(EventStoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn retry_until_failed() {
        let repo = InMemoryEventRepository::with_retry_policy(fast_policy());
        let event = create_test_event("account", "account.created");
        repo.insert(event.clone()).await.unwrap();

        let mut previous = repo.fetch_by_id(event.id).await.unwrap();
        for expected_retry in 1..=2 {
            repo.mark_retry(event.id).await.unwrap();
            let current = repo.fetch_by_id(event.id).await.unwrap();
            assert_eq!(current.retry, expected_retry);
            assert_eq!(current.state, EventState::Ready);
            assert!(current.scheduled_at > previous.scheduled_at);
            previous = current;
        }

        repo.mark_retry(event.id).await.unwrap();
        let failed = repo.fetch_by_id(event.id).await.unwrap();
        assert_eq!(failed.retry, 3);
        assert_eq!(failed.state, EventState::Failed);
        assert_eq!(failed.scheduled_at, previous.scheduled_at);
        assert!(failed.completed_at.is_some());

        assert!(repo.mark_retry(event.id).await.is_err());
        assert_eq!(repo.fetch_by_id(event.id).await.unwrap().retry, 3);
    }

    #[tokio::test]
    async fn rescheduled_event_is_not_processable_yet() {
        let repo = InMemoryEventRepository::with_retry_policy(fast_policy());
        let event = create_test_event("account", "account.created");
        repo.insert(event.clone()).await.unwrap();

        repo.mark_retry(event.id).await.unwrap();
        assert!(repo.fetch_processable(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn force_state_is_terminal() {
        let repo = InMemoryEventRepository::new();
        let event = create_test_event("account", "unknown.thing");
        repo.insert(event.clone()).await.unwrap();

        repo.force_state(event.id, EventState::Unprocessable)
            .await
            .unwrap();
        let stored = repo.fetch_by_id(event.id).await.unwrap();
        assert_eq!(stored.state, EventState::Unprocessable);
        assert_eq!(stored.retry, 0);

        assert!(repo.mark_completed(event.id).await.is_err());
        assert!(repo.mark_retry(event.id).await.is_err());
        assert!(
            repo.force_state(event.id, EventState::Failed)
                .await
                .is_err()
        );
        assert_eq!(
            repo.fetch_by_id(event.id).await.unwrap().state,
            EventState::Unprocessable
        );
    }

    #[tokio::test]
    async fn fetch_by_origin_and_state() {
        let repo = InMemoryEventRepository::new();
        let a = create_test_event("account", "account.created");
        let c1 = create_test_event("customer", "customer.created");
        let c2 = create_test_event("customer", "customer.created");
        repo.insert(a).await.unwrap();
        repo.insert(c1.clone()).await.unwrap();
        repo.insert(c2).await.unwrap();
        repo.mark_completed(c1.id).await.unwrap();

        let customer = EventOrigin::customer();
        let ready = repo
            .fetch_by_origin_and_state(&customer, EventState::Ready, 5)
            .await
            .unwrap();
        assert_eq!(ready.len(), 1);

        let completed = repo
            .fetch_by_origin_and_state(&customer, EventState::Completed, 5)
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, c1.id);

        assert_eq!(repo.fetch_all().await.unwrap().len(), 3);
    }
}
