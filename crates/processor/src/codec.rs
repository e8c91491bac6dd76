//! Type-tag registry for decoding event payloads.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure to turn an event payload into a typed event.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Malformed {event_type} payload: {source}")]
    Malformed {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

type DecodeFn<T> = Box<dyn Fn(&[u8]) -> serde_json::Result<T> + Send + Sync>;

/// Maps event type tags to decode functions producing variants of `T`.
///
/// Registering a type is a single call pairing the tag with the variant
/// constructor of its payload:
///
/// ```
/// use domain::{AccountCreated, AccountEvent};
/// use processor::EventCodec;
///
/// let codec = EventCodec::new().register("account.created", AccountEvent::Created);
/// let event = codec
///     .decode("account.created", br#"{"initialBalance": 1000, "currency": "USD"}"#)
///     .unwrap();
/// assert!(matches!(event, AccountEvent::Created(AccountCreated { .. })));
/// ```
pub struct EventCodec<T> {
    decoders: HashMap<&'static str, DecodeFn<T>>,
}

impl<T: 'static> EventCodec<T> {
    /// Creates an empty codec.
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers the JSON payload `P` under `event_type`, wrapped by `variant`.
    ///
    /// A later registration for the same tag replaces the earlier one.
    pub fn register<P>(mut self, event_type: &'static str, variant: fn(P) -> T) -> Self
    where
        P: DeserializeOwned + 'static,
    {
        self.decoders.insert(
            event_type,
            Box::new(move |bytes| serde_json::from_slice::<P>(bytes).map(variant)),
        );
        self
    }

    /// Returns true if `event_type` has a registered decoder.
    pub fn supports(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Returns the registered type tags.
    pub fn event_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.decoders.keys().copied()
    }

    /// Decodes `data` as the payload of `event_type`.
    ///
    /// An empty payload is malformed, even for payloads without fields.
    pub fn decode(&self, event_type: &str, data: &[u8]) -> Result<T, DecodeError> {
        let decode = self
            .decoders
            .get(event_type)
            .ok_or_else(|| DecodeError::UnknownType(event_type.to_string()))?;

        decode(data).map_err(|source| DecodeError::Malformed {
            event_type: event_type.to_string(),
            source,
        })
    }
}

impl<T: 'static> Default for EventCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.decoders.keys().collect();
        types.sort();
        f.debug_struct("EventCodec").field("types", &types).finish()
    }
}
