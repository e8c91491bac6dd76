//! Domain error types.

use common::ContextId;
use thiserror::Error;

/// Classification of a [`DomainError`].
///
/// Processors switch on the kind to decide whether an event completes,
/// fails for good, or is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The entity to create already exists.
    AlreadyExists,
    /// The entity to mutate does not exist.
    NotFound,
    /// A withdrawal exceeds the balance.
    InsufficientFunds,
    /// The entity is blocked and rejects the operation.
    Blocked,
    /// The request can never succeed as given.
    Invalid,
    /// Storage or network failure, presumed transient.
    Unavailable,
}

/// Errors returned by read-side repositories.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: ContextId },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: ContextId },

    #[error("Insufficient funds in account {account_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        account_id: ContextId,
        requested: f64,
        available: f64,
    },

    #[error("{entity} {id} is blocked")]
    Blocked { entity: &'static str, id: ContextId },

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            DomainError::Blocked { .. } => ErrorKind::Blocked,
            DomainError::Invalid(_) => ErrorKind::Invalid,
            DomainError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

/// Result type for domain repository operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        let id = ContextId::new();
        assert_eq!(
            DomainError::AlreadyExists {
                entity: "account",
                id
            }
            .kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            DomainError::NotFound {
                entity: "account",
                id
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            DomainError::InsufficientFunds {
                account_id: id,
                requested: 100.0,
                available: 10.0
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            DomainError::Unavailable("timeout".into()).kind(),
            ErrorKind::Unavailable
        );
    }

    #[test]
    fn display_messages() {
        let id = ContextId::new();
        let err = DomainError::NotFound {
            entity: "customer",
            id,
        };
        assert_eq!(err.to_string(), format!("customer not found: {id}"));
    }
}
