//! Scored pair queries.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use fixloop_core::errors::StorageError;
use fixloop_core::models::FindingFixPair;

use super::{from_json, from_micros, to_json, to_micros};
use crate::to_storage_err;

/// Insert a pair, or overwrite the score of an already stored one.
/// Returns `true` only for a new pair id.
pub fn upsert_pair(conn: &Connection, pair: &FindingFixPair) -> Result<bool, StorageError> {
    let existed: bool = conn
        .prepare_cached("SELECT EXISTS(SELECT 1 FROM pairs WHERE pair_id = ?1)")
        .map_err(to_storage_err)?
        .query_row(params![pair.pair_id], |row| row.get(0))
        .map_err(to_storage_err)?;
    conn.prepare_cached(
        "INSERT INTO pairs (pair_id, finding_id, fix_commit_sha, repo, rule_id, file_path,
             pairing_type, confidence_score, disappearance_confirmed, promoted, created_at, payload)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(pair_id) DO UPDATE SET
             pairing_type = excluded.pairing_type,
             confidence_score = excluded.confidence_score,
             disappearance_confirmed = excluded.disappearance_confirmed,
             promoted = excluded.promoted,
             created_at = excluded.created_at,
             payload = excluded.payload",
    )
    .map_err(to_storage_err)?
    .execute(params![
        pair.pair_id,
        pair.finding_id.to_string(),
        pair.fix_commit_sha,
        pair.repo,
        pair.rule_id,
        pair.file_path,
        pair.pairing_type.name(),
        pair.confidence_score,
        pair.disappearance_confirmed,
        pair.promoted,
        to_micros(pair.created_at),
        to_json(pair)?,
    ])
    .map_err(to_storage_err)?;
    Ok(!existed)
}

/// Promoted pairs created strictly after `since`, oldest first.
pub fn promoted_since(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<FindingFixPair>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT payload FROM pairs
             WHERE promoted = 1 AND created_at > ?1
             ORDER BY created_at ASC, pair_id ASC",
        )
        .map_err(to_storage_err)?;
    let payloads = stmt
        .query_map(params![to_micros(since)], |row| row.get::<_, String>(0))
        .map_err(to_storage_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_storage_err)?;
    payloads.iter().map(|p| from_json(p)).collect()
}

pub fn latest_promoted_at(conn: &Connection) -> Result<Option<DateTime<Utc>>, StorageError> {
    let micros: Option<i64> = conn
        .prepare_cached("SELECT MAX(created_at) FROM pairs WHERE promoted = 1")
        .map_err(to_storage_err)?
        .query_row([], |row| row.get(0))
        .map_err(to_storage_err)?;
    micros.map(from_micros).transpose()
}
