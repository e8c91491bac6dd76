//! Routing of events to the processor of their origin.

use std::collections::HashMap;
use std::sync::Arc;

use event_store::{Event, EventRepository};

use crate::Result;
use crate::processor::{EventProcessor, ProcessOutcome, reject_unprocessable};

/// Routes events to the processor registered for their origin.
///
/// Events whose origin has no processor are forced to `unprocessable`.
pub struct ProcessorRegistry<R> {
    gateway: R,
    processors: HashMap<String, Arc<dyn EventProcessor>>,
}

impl<R: EventRepository> ProcessorRegistry<R> {
    /// Creates an empty registry recording unroutable events on `gateway`.
    pub fn new(gateway: R) -> Self {
        Self {
            gateway,
            processors: HashMap::new(),
        }
    }

    /// Registers a processor under its origin, replacing any previous one.
    pub fn register(&mut self, processor: Arc<dyn EventProcessor>) {
        self.processors
            .insert(processor.origin().to_string(), processor);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_processor(mut self, processor: Arc<dyn EventProcessor>) -> Self {
        self.register(processor);
        self
    }

    /// Gets the processor for `origin`.
    pub fn get(&self, origin: &str) -> Option<&Arc<dyn EventProcessor>> {
        self.processors.get(origin)
    }

    /// Returns the registered origins, sorted.
    pub fn origins(&self) -> Vec<&str> {
        let mut origins: Vec<_> = self.processors.keys().map(String::as_str).collect();
        origins.sort_unstable();
        origins
    }

    /// Returns the gateway the registry records on.
    pub fn gateway(&self) -> &R {
        &self.gateway
    }

    /// Processes `event` with the processor of its origin.
    pub async fn process(&self, event: &Event) -> Result<ProcessOutcome> {
        match self.processors.get(event.origin.as_str()) {
            Some(processor) => processor.process(event).await,
            None => reject_unprocessable(&self.gateway, event).await,
        }
    }
}
