//! Persisted event records and the gateway that drives their lifecycle.
//!
//! - [`Event`] is the unit of work, with its [`EventState`] state machine
//! - [`RetryPolicy`] computes the backoff applied on retryable failures
//! - [`EventRepository`] is the gateway trait used by processors and the dispatch loop
//! - [`InMemoryEventRepository`] and [`PostgresEventRepository`] implement it

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod retry;
pub mod store;

pub use common::ContextId;
pub use error::{EventStoreError, Result};
pub use event::{
    DEFAULT_MAX_RETRY, Event, EventBuilder, EventId, EventOrigin, EventState, LifecycleAction,
    Transition,
};
pub use memory::InMemoryEventRepository;
pub use postgres::PostgresEventRepository;
pub use query::EventQuery;
pub use retry::{RetryPolicy, RetryPolicyBuilder};
pub use store::{EventRepository, EventRepositoryExt};
