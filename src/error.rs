//! Error types for the circulation core

use serde::Serialize;
use thiserror::Error;

use crate::models::copy::CopyStatus;

/// Entity kinds referenced by circulation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Patron,
    Book,
    Copy,
    Loan,
    Reservation,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Entity::Patron => "patron",
            Entity::Book => "book",
            Entity::Copy => "copy",
            Entity::Loan => "loan",
            Entity::Reservation => "reservation",
        };
        write!(f, "{}", label)
    }
}

/// Machine-readable reason codes carried by every domain failure.
///
/// The calling layer maps these to user-facing messages; the core never
/// formats human text beyond the `Display` impl used for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    PatronBlocked,
    LoanLimitReached,
    CopyUnavailable,
    NoCopiesAvailable,
    AlreadyReturned,
    AlreadyExtended,
    AlreadyFulfilled,
    AlreadyCancelled,
    AlreadyExpired,
    AlreadyReserved,
    CopyCurrentlyAvailable,
    ReservationPending,
    ReservationLimitReached,
    ReservationNotActive,
    ReservationExpired,
    InvalidTransition,
    NotYetExpired,
    CopyNotEarmarked,
    CopyBookMismatch,
    InvalidTtl,
    DuplicateInventoryCode,
}

/// Coarse error classification, one step above [`Reason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Invalid,
    Storage,
}

/// Main error type for circulation operations
#[derive(Error, Debug)]
pub enum CirculationError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: u64 },

    #[error("forbidden ({reason:?}): {entity} {id}")]
    Forbidden {
        reason: Reason,
        entity: Entity,
        id: u64,
    },

    #[error("conflict ({reason:?}): {entity} {id}")]
    Conflict {
        reason: Reason,
        entity: Entity,
        id: u64,
    },

    #[error("invalid request ({reason:?}): {detail}")]
    Invalid { reason: Reason, detail: String },

    /// Collaborator (storage) failure, propagated unchanged and unretried.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CirculationError {
    pub fn not_found(entity: Entity, id: u64) -> Self {
        CirculationError::NotFound { entity, id }
    }

    pub fn forbidden(reason: Reason, entity: Entity, id: u64) -> Self {
        CirculationError::Forbidden { reason, entity, id }
    }

    pub fn conflict(reason: Reason, entity: Entity, id: u64) -> Self {
        CirculationError::Conflict { reason, entity, id }
    }

    pub fn invalid(reason: Reason, detail: impl Into<String>) -> Self {
        CirculationError::Invalid {
            reason,
            detail: detail.into(),
        }
    }

    /// Conflict raised when a copy is found in a status an operation does
    /// not accept.
    pub fn invalid_transition(copy_id: u64, observed: CopyStatus) -> Self {
        tracing::debug!("invalid copy transition: copy {} is {}", copy_id, observed);
        CirculationError::Conflict {
            reason: Reason::InvalidTransition,
            entity: Entity::Copy,
            id: copy_id,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CirculationError::NotFound { .. } => ErrorKind::NotFound,
            CirculationError::Forbidden { .. } => ErrorKind::Forbidden,
            CirculationError::Conflict { .. } => ErrorKind::Conflict,
            CirculationError::Invalid { .. } => ErrorKind::Invalid,
            CirculationError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn reason(&self) -> Option<Reason> {
        match self {
            CirculationError::Forbidden { reason, .. }
            | CirculationError::Conflict { reason, .. }
            | CirculationError::Invalid { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Result type alias for circulation operations
pub type CircResult<T> = Result<T, CirculationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = CirculationError::not_found(Entity::Loan, 7);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.reason(), None);

        let err = CirculationError::conflict(Reason::AlreadyReturned, Entity::Loan, 7);
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.reason(), Some(Reason::AlreadyReturned));
    }

    #[test]
    fn test_display_carries_entity_and_id() {
        let err = CirculationError::forbidden(Reason::PatronBlocked, Entity::Patron, 42);
        assert_eq!(err.to_string(), "forbidden (PatronBlocked): patron 42");
    }
}
