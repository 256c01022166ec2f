use sqlx::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DatabaseError {
    #[error("Internal database error: {0}")]
    BackendError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

impl DatabaseError {
    /// Whether the backend rejected a write because of a UNIQUE or PRIMARY KEY constraint.
    pub fn is_unique_violation(&self) -> bool {
        if let DatabaseError::BackendError(sqlx_err) = self
            && let Some(db_err) = sqlx_err.as_database_error()
        {
            matches!(db_err.kind(), ErrorKind::UniqueViolation)
        } else {
            false
        }
    }
}
