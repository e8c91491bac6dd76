use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::retry::to_chrono;
use crate::{
    ContextId, Event, EventId, EventOrigin, EventQuery, EventState, EventStoreError, Result,
    RetryPolicy, Transition, store::EventRepository,
};

const EVENT_COLUMNS: &str = "id, context_id, event_origin, event_type, event_type_version, \
     event_state, created_at, scheduled_at, started_at, completed_at, retry, max_retry, event_data";

/// PostgreSQL-backed event repository.
///
/// Every command locks the row (`SELECT ... FOR UPDATE`), applies the
/// lifecycle transition defined on [`Event`] and writes the result back in
/// the same transaction, so both backends share one state machine.
#[derive(Clone)]
pub struct PostgresEventRepository {
    pool: PgPool,
    policy: RetryPolicy,
}

impl PostgresEventRepository {
    /// Creates a new repository with the default retry policy.
    pub fn new(pool: PgPool) -> Self {
        Self::with_retry_policy(pool, RetryPolicy::default())
    }

    /// Creates a new repository with the given retry policy.
    pub fn with_retry_policy(pool: PgPool, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Stores a new event.
    pub async fn insert(&self, event: &Event) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, context_id, event_origin, event_type, event_type_version,
                                event_state, created_at, scheduled_at, started_at, completed_at,
                                retry, max_retry, event_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.context_id.as_uuid())
        .bind(event.origin.as_str())
        .bind(&event.event_type)
        .bind(&event.type_version)
        .bind(event.state.as_str())
        .bind(event.created_at)
        .bind(event.scheduled_at)
        .bind(event.started_at)
        .bind(event.completed_at)
        .bind(to_db_int(event.retry)?)
        .bind(to_db_int(event.max_retry)?)
        .bind(&event.data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<Event> {
        let state: String = row.try_get("event_state")?;

        Ok(Event {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            context_id: ContextId::from_uuid(row.try_get::<Uuid, _>("context_id")?),
            origin: EventOrigin::new(row.try_get::<String, _>("event_origin")?),
            event_type: row.try_get("event_type")?,
            type_version: row.try_get("event_type_version")?,
            state: state.parse()?,
            created_at: row.try_get("created_at")?,
            scheduled_at: row.try_get("scheduled_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            retry: from_db_int(row.try_get("retry")?, "retry")?,
            max_retry: from_db_int(row.try_get("max_retry")?, "max_retry")?,
            data: row.try_get("event_data")?,
        })
    }

    async fn apply<F>(&self, id: EventId, action: F) -> Result<Event>
    where
        F: FnOnce(&mut Event, DateTime<Utc>) -> Result<Transition> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;

        let mut event = match row {
            Some(row) => Self::row_to_event(row)?,
            None => return Err(EventStoreError::NotFound(id)),
        };

        if action(&mut event, Utc::now())? == Transition::Applied {
            sqlx::query(
                r#"
                UPDATE events
                SET event_state = $2, scheduled_at = $3, started_at = $4, completed_at = $5, retry = $6
                WHERE id = $1
                "#,
            )
            .bind(id.as_uuid())
            .bind(event.state.as_str())
            .bind(event.scheduled_at)
            .bind(event.started_at)
            .bind(event.completed_at)
            .bind(to_db_int(event.retry)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(event)
    }
}

fn to_db_int(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| EventStoreError::InvalidRecord(format!("counter {value} out of range")))
}

/// Postgres rejects a negative `LIMIT`; anything past `i64::MAX` means "no limit" anyway.
fn to_db_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn from_db_int(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| EventStoreError::InvalidRecord(format!("negative {column}: {value}")))
}

#[async_trait]
impl EventRepository for PostgresEventRepository {
    async fn fetch_processable(&self, limit: usize) -> Result<Vec<Event>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE event_state = 'ready' AND scheduled_at <= $1
            ORDER BY scheduled_at ASC, created_at ASC
            LIMIT $2
            "#
        ))
        .bind(Utc::now())
        .bind(to_db_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn claim_processable(&self, limit: usize, lease: Duration) -> Result<Vec<Event>> {
        let now = Utc::now();
        let stale_before = now
            .checked_sub_signed(to_chrono(lease))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        // Taking over an abandoned claim spends one attempt; the last one fails the event.
        let rows = sqlx::query(&format!(
            r#"
            UPDATE events
            SET event_state = CASE
                    WHEN event_state = 'processing' AND retry + 1 >= max_retry THEN 'failed'
                    ELSE 'processing'
                END,
                retry = CASE
                    WHEN event_state = 'processing' THEN LEAST(retry + 1, max_retry)
                    ELSE retry
                END,
                started_at = CASE
                    WHEN event_state = 'processing' AND retry + 1 >= max_retry THEN started_at
                    ELSE $2
                END,
                completed_at = CASE
                    WHEN event_state = 'processing' AND retry + 1 >= max_retry THEN $2
                    ELSE completed_at
                END
            WHERE id IN (
                SELECT id FROM events
                WHERE (event_state = 'ready' AND scheduled_at <= $2)
                   OR (event_state = 'processing' AND (started_at IS NULL OR started_at <= $3))
                ORDER BY scheduled_at ASC, created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(to_db_limit(limit))
        .bind(now)
        .bind(stale_before)
        .fetch_all(&self.pool)
        .await?;

        let (mut events, exhausted): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .partition(|event| event.state == EventState::Processing);
        for event in &exhausted {
            tracing::warn!(
                event_id = %event.id,
                retry = event.retry,
                "abandoned claim exhausted retries, event failed"
            );
        }
        events.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then(a.created_at.cmp(&b.created_at))
        });

        metrics::counter!("events_claimed_total").increment(events.len() as u64);
        Ok(events)
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<Event>> {
        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.origin.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_origin = ${param_count}"));
        }
        if query.state.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_state = ${param_count}"));
        }
        if query.event_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ${param_count}"));
        }
        if query.context_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND context_id = ${param_count}"));
        }

        sql.push_str(" ORDER BY scheduled_at ASC, created_at ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(origin) = query.origin {
            sqlx_query = sqlx_query.bind(origin.as_str().to_string());
        }
        if let Some(state) = query.state {
            sqlx_query = sqlx_query.bind(state.as_str());
        }
        if let Some(event_type) = query.event_type {
            sqlx_query = sqlx_query.bind(event_type);
        }
        if let Some(context_id) = query.context_id {
            sqlx_query = sqlx_query.bind(context_id.as_uuid());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(to_db_limit(limit));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn fetch_by_id(&self, id: EventId) -> Result<Event> {
        let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_event(row),
            None => Err(EventStoreError::NotFound(id)),
        }
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
