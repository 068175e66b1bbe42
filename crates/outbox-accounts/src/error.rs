//! Error types for the Accounts context.

use outbox_core::error::RepositoryError;
use thiserror::Error;

/// Errors returned by account use cases.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Another account already uses this email address.
    #[error("an account with email {email} already exists")]
    AlreadyExists {
        /// The normalized email address.
        email: String,
    },

    /// No account has this id.
    #[error("account not found: {id}")]
    NotFound {
        /// The requested account id.
        id: String,
    },

    /// The input was rejected.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The presented email validation token does not match.
    #[error("invalid email validation token")]
    InvalidToken,

    /// The account changed since it was read.
    #[error("account {id} was modified concurrently")]
    Conflict {
        /// The contended account id.
        id: String,
    },

    /// Persistence failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
