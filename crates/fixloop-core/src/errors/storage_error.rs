//! Storage errors.

use super::error_code::{self, FixloopErrorCode};

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("Database busy: {message}")]
    DbBusy { message: String },

    #[error("Migration to v{version} failed: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("Not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl FixloopErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DbBusy { .. } => error_code::DB_BUSY,
            Self::MigrationFailed { .. } => error_code::MIGRATION_FAILED,
            Self::NotFound { .. } => error_code::NOT_FOUND,
            _ => error_code::STORAGE_ERROR,
        }
    }
}
