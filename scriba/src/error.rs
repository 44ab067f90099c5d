//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn credential(msg: impl Into<String>) -> Self {
        Self::InvalidCredential(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Whether this error invalidates a whole session rather than a single job.
    ///
    /// Session-fatal errors abort the pipeline: an unusable credential and
    /// internal invariant violations (a job vanishing from the store or a
    /// backward status transition). Everything else is job-local.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredential(_)
                | Self::InvalidStateTransition { .. }
                | Self::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_fatal_partition() {
        assert!(Error::credential("bad key file").is_session_fatal());
        assert!(
            Error::InvalidStateTransition {
                from: "done".into(),
                to: "pending".into(),
            }
            .is_session_fatal()
        );
        assert!(!Error::provider("quota exhausted").is_session_fatal());
        assert!(!Error::validation("empty batch").is_session_fatal());
    }
}
