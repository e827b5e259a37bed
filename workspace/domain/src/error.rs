use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::error;

use crate::mail::MailError;

/// Error types for the domain layer
#[derive(Error, Debug)]
pub enum DomainError {
    /// Malformed or out-of-range input
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A uniqueness rule was violated
    #[error("{0}")]
    Conflict(String),

    /// A referenced entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// The submitted confirmation code does not match the stored one
    #[error("Invalid confirmation code")]
    InvalidCredentials,

    /// The caller is known but the authorization policy vetoed the action
    #[error("{0}")]
    PermissionDenied(String),

    /// No caller, or the presented token could not be verified
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthenticated,

    /// The confirmation email could not be handed to the mail backend
    #[error("Email delivery failed: {0}")]
    Delivery(#[from] MailError),

    /// Signing an access token failed
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: &str, key: impl std::fmt::Display) -> Self {
        DomainError::NotFound(format!("{what} '{key}' not found"))
    }

    /// Classifies a failed write: unique-constraint violations become
    /// [`DomainError::Conflict`] with the given message, anything else stays a
    /// database error.
    pub fn from_write(err: DbErr, conflict: impl FnOnce() -> String) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                let message = conflict();
                tracing::warn!(%detail, "Unique constraint violated: {}", message);
                DomainError::Conflict(message)
            }
            _ => {
                error!(?err, "Database write failed");
                DomainError::Database(err)
            }
        }
    }
}

/// Type alias for Result with DomainError
pub type Result<T> = std::result::Result<T, DomainError>;
