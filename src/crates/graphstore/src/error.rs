//! Error types for graph persistence.

use thiserror::Error;

/// Result type for graph store operations.
pub type Result<T> = std::result::Result<T, GraphStoreError>;

/// Errors that can occur in the graph store.
#[derive(Debug, Error)]
pub enum GraphStoreError {
    /// Connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Constraint violation (unique, check, foreign key)
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Self-loop or otherwise invalid pair
    #[error("Invalid pair: {0}")]
    InvalidPair(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationError(String),

    /// Query execution error
    #[error("Query error: {0}")]
    QueryError(String),
}

impl GraphStoreError {
    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphStoreError::NotFound(_))
    }

    /// Check if this is a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, GraphStoreError::ConstraintViolation(_))
    }
}

impl From<sqlx::Error> for GraphStoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                GraphStoreError::NotFound("No matching row found in database".to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() || db.is_check_violation() => {
                GraphStoreError::ConstraintViolation(db.to_string())
            }
            sqlx::Error::Io(err) => GraphStoreError::ConnectionError(format!("IO error: {}", err)),
            sqlx::Error::PoolTimedOut => {
                GraphStoreError::ConnectionError("connection pool timed out".to_string())
            }
            other => GraphStoreError::QueryError(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for GraphStoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        GraphStoreError::MigrationError(err.to_string())
    }
}
