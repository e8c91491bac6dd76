use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the aggregate instance an event describes.
///
/// An account event carries the account ID here, a customer event the
/// customer ID. Processors use it to address the read-side entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(Uuid);

impl ContextId {
    /// Creates a new random context ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a context ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ContextId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ContextId> for Uuid {
    fn from(id: ContextId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_id_new_creates_unique_ids() {
        assert_ne!(ContextId::new(), ContextId::new());
    }

    #[test]
    fn context_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = ContextId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
        assert_eq!(Uuid::from(id), uuid);
    }

    #[test]
    fn context_id_serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&ContextId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }
}
