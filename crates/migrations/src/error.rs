//! Error types for the migration engine
//!
//! Construction-time and misuse errors are returned to the caller directly.
//! Errors raised while a batch is executing are folded into a
//! [`MigrationRunResult`](crate::MigrationRunResult) by the runner instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Error types for migration discovery, execution and bookkeeping
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The migrations directory is missing or unreadable
    #[error("Invalid migrations directory '{}': {reason}", .path.display())]
    DirectoryInvalid { path: PathBuf, reason: String },

    /// The mandatory forward source of a declarative migration is missing
    #[error("Migration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A migration source or the migrations directory could not be read
    #[error("Failed to read '{}': {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The driver rejected a statement
    #[error("Statement execution failed: {message}")]
    StatementExecutionFailure { statement: String, message: String },

    /// An imperative migration could not be resolved to an executable unit
    #[error("Unable to resolve migration unit '{0}'")]
    UnitResolutionFailure(String),

    /// The ledger store could not be prepared
    #[error("Failed to initialize migration ledger: {0}")]
    LedgerInitFailure(String),

    /// The ledger cannot represent the target database engine
    #[error("Unsupported migration store: {0}")]
    UnsupportedStore(String),

    /// A direction token other than "up" or "down" was supplied
    #[error("Invalid migration direction '{0}', expected 'up' or 'down'")]
    InvalidDirection(String),

    /// A migration name that cannot be turned into a file name
    #[error("Invalid migration name '{0}'")]
    InvalidName(String),

    /// Database connection or query error reported by the driver
    #[error("Database error: {0}")]
    Database(String),

    /// Reading or writing a ledger entry failed
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        MigrationError::Database(err.to_string())
    }
}
