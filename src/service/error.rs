use crate::form::ValidationError;
use crate::repository::error::DatabaseError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("Duplicate key: {key}")]
    DuplicateKey { key: String },

    #[error("Not found: {key}")]
    NotFound { key: String },

    #[error("Invalid or unknown token")]
    InvalidToken,

    #[error("Confirmation is unknown or has expired")]
    ConfirmationExpired,

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unexpected result: {message}")]
    UnexpectedResult { message: String },

    #[error("DatabaseError: {0}")]
    DatabaseError(#[from] DatabaseError),
}

impl ServiceError {
    /// Maps a constraint violation raised by a racing writer onto `DuplicateKey`.
    pub(crate) fn from_write(err: DatabaseError, key: &str) -> Self {
        if err.is_unique_violation() {
            ServiceError::DuplicateKey {
                key: key.to_string(),
            }
        } else {
            ServiceError::DatabaseError(err)
        }
    }

    /// Whether this error originates from the datastore rather than from the request.
    pub fn is_datastore_error(&self) -> bool {
        matches!(
            self,
            ServiceError::DatabaseError(_) | ServiceError::UnexpectedResult { .. }
        )
    }
}
