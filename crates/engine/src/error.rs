//! Errors the engine can return.
//!
//! Every variant except [`Database`] maps to a client-visible condition:
//!
//! - [`NotFound`]: the entity does not exist or is outside the caller's
//!   ownership scope.
//! - [`Forbidden`]: the entity is visible but the caller lacks the group
//!   capability for the mutation.
//! - [`Conflict`]: the write would violate a uniqueness or dependency
//!   invariant (duplicate budget, delete with dependents, cross-scope
//!   subcategory reference).
//! - [`InvalidInput`]: malformed amounts, dates, or enum values.
//!
//! [`NotFound`]: EngineError::NotFound
//! [`Forbidden`]: EngineError::Forbidden
//! [`Conflict`]: EngineError::Conflict
//! [`InvalidInput`]: EngineError::InvalidInput
//! [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
