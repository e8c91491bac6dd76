//! Identifier types shared by every crate of the event orchestrator.

pub mod types;

pub use types::ContextId;
