//! Error type shared by the database layer and the HTTP handlers.

use crate::scheduling::{SlotFormatError, SlotRejection};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur while serving a portal operation.
#[derive(Debug, Error)]
pub enum PortalError {
    /// SQLite returned an error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A thread panicked while holding the connection lock
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// The entity does not exist or is not visible to the caller
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// Missing or invalid credentials
    #[error("{message}")]
    Unauthorized { message: String },

    /// The caller may not touch this entity
    #[error("{message}")]
    Forbidden { message: String },

    /// The operation collides with existing state
    #[error("{message}")]
    Conflict { message: String },

    /// The request body failed validation
    #[error("{message}")]
    InvalidInput { message: String },

    /// A slot failed a scheduling rule
    #[error("Slot rejected: {0}")]
    Slot(#[from] SlotRejection),

    /// A date or time could not be parsed
    #[error("Invalid date or time format: {0}")]
    Format(#[from] SlotFormatError),
}

impl PortalError {
    pub fn not_found(entity: &'static str) -> Self {
        PortalError::NotFound { entity }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        PortalError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        PortalError::Forbidden {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortalError::Conflict {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        PortalError::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns true if this error is a UNIQUE or CHECK constraint failure.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            PortalError::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for PortalError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        PortalError::LockPoisoned
    }
}
