//! Event processors for the event orchestrator.
//!
//! This crate provides:
//! - [`EventCodec`], a type-tag registry that decodes payloads into typed events
//! - [`EventProcessor`] trait implemented once per origin
//! - [`AccountProcessor`] and [`CustomerProcessor`] which apply events through the
//!   domain repositories and record the outcome on the event gateway
//! - [`ProcessorRegistry`] which routes events to the processor of their origin

pub mod account;
pub mod codec;
pub mod customer;
pub mod error;
pub mod processor;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use account::{AccountProcessor, account_codec};
pub use codec::{DecodeError, EventCodec};
pub use customer::{CustomerProcessor, customer_codec};
pub use error::{ProcessorError, Result};
pub use processor::{DecodeFailurePolicy, EventProcessor, ProcessOutcome};
pub use registry::ProcessorRegistry;
