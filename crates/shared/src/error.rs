//! Error types for Campfire

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CampfireError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// An alias is already claimed by another tenant
    #[error("Alias already in use: {0}")]
    Conflict(String),

    /// Storage returned more than one tenant for a single alias
    #[error("Ambiguous alias: {0}")]
    AmbiguousAlias(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for CampfireError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CampfireError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // PostgreSQL unique violation
                if db_err.code().as_deref() == Some("23505") {
                    return CampfireError::Conflict(db_err.message().to_string());
                }
                CampfireError::Database(db_err.to_string())
            }
            other => CampfireError::Database(other.to_string()),
        }
    }
}

pub type CampfireResult<T> = Result<T, CampfireError>;
