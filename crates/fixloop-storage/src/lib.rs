//! # fixloop-storage
//!
//! SQLite persistence for the promotion pipeline: a serialized writer plus
//! a read pool, `user_version` migrations, keyset pagination, and the
//! pattern, decision, codemod, pair, watermark and publication tables.
//!
//! [`StorageEngine`] is the storage runtime. [`SqlitePatternRepository`]
//! is the adapter that binds it to the `PatternRepository` contract.

pub mod connection;
pub mod engine;
pub mod migrations;
pub mod pagination;
pub mod queries;
pub mod repository;

pub use engine::StorageEngine;
pub use pagination::PaginationCursor;
pub use repository::SqlitePatternRepository;

use fixloop_core::errors::StorageError;

/// Map a rusqlite error, keeping lock contention distinguishable.
pub(crate) fn to_storage_err(e: rusqlite::Error) -> StorageError {
    match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
            StorageError::DbBusy {
                message: e.to_string(),
            }
        }
        _ => StorageError::SqliteError {
            message: e.to_string(),
        },
    }
}
