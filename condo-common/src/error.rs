//! Common error types for condo-ledger

use thiserror::Error;

/// Common result type for condo-ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the server and the importer
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write rejected because it collides with existing data
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Reclassify constraint violations reported by SQLite as conflicts.
    ///
    /// UNIQUE and FOREIGN KEY failures are caused by the request, not by the
    /// server, so callers surface them as `Conflict`.
    pub fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Error::Conflict(db_err.message().to_string());
            }
            if db_err.is_foreign_key_violation() {
                return Error::Conflict(format!(
                    "Referenced record missing or still in use ({})",
                    db_err.message()
                ));
            }
        }
        Error::Database(err)
    }

    /// SQLite aborts `SUM` on integer overflow; that is bad data, not a server fault
    pub fn from_aggregate(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.message().contains("integer overflow") {
                return Error::InvalidInput(
                    "Total exceeds the supported amount range".to_string(),
                );
            }
        }
        Error::Database(err)
    }
}

impl From<crate::db::query_builder::QueryError> for Error {
    fn from(err: crate::db::query_builder::QueryError) -> Self {
        Error::InvalidInput(err.to_string())
    }
}
