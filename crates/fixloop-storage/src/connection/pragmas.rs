//! PRAGMA configuration applied to every SQLite connection.
//!
//! Writer: WAL, NORMAL sync, 64MB cache, 5s busy_timeout, foreign keys.
//! Readers: busy_timeout and query_only.

use rusqlite::Connection;

use fixloop_core::errors::StorageError;

use crate::to_storage_err;

pub fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -64000;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(to_storage_err)
}

pub fn apply_read_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA busy_timeout = 5000;
        PRAGMA cache_size = -16000;
        PRAGMA query_only = ON;
        ",
    )
    .map_err(to_storage_err)
}

/// Whether WAL mode is active on a connection. In-memory databases
/// report `memory`.
pub fn verify_wal_mode(conn: &Connection) -> Result<bool, StorageError> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(to_storage_err)?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}
