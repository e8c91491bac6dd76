//! Core domain event trait.

/// Trait for decoded domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and named in past tense.
pub trait DomainEvent: Send + Sync + Clone + std::fmt::Debug {
    /// Returns the type tag the event is persisted under, e.g. `account.created`.
    fn event_type(&self) -> &'static str;
}
