//! Sync watermarks and the publication ledger.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use fixloop_core::errors::StorageError;

use super::{from_micros, to_micros};
use crate::to_storage_err;

pub fn get_watermark(conn: &Connection, name: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
    let micros: Option<i64> = conn
        .prepare_cached("SELECT value FROM sync_watermarks WHERE name = ?1")
        .map_err(to_storage_err)?
        .query_row(params![name], |row| row.get(0))
        .optional()
        .map_err(to_storage_err)?;
    micros.map(from_micros).transpose()
}

/// Watermarks only move forward; an older value is ignored.
pub fn advance_watermark(
    conn: &Connection,
    name: &str,
    value: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    conn.prepare_cached(
        "INSERT INTO sync_watermarks (name, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
         WHERE excluded.value > sync_watermarks.value",
    )
    .map_err(to_storage_err)?
    .execute(params![name, to_micros(value), to_micros(now)])
    .map_err(to_storage_err)?;
    Ok(())
}

/// Returns `true` when the key was newly recorded.
pub fn record_publication(
    conn: &Connection,
    key: &str,
    kind: &str,
    at: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let inserted = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO publications (publication_key, kind, recorded_at)
             VALUES (?1, ?2, ?3)",
        )
        .map_err(to_storage_err)?
        .execute(params![key, kind, to_micros(at)])
        .map_err(to_storage_err)?;
    Ok(inserted == 1)
}

pub fn forget_publication(conn: &Connection, key: &str) -> Result<bool, StorageError> {
    let deleted = conn
        .prepare_cached("DELETE FROM publications WHERE publication_key = ?1")
        .map_err(to_storage_err)?
        .execute(params![key])
        .map_err(to_storage_err)?;
    Ok(deleted == 1)
}
