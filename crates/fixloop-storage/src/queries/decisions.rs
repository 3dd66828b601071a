//! Decision audit queries. The full record is stored as JSON; the filter
//! and ordering columns are denormalized next to it.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use fixloop_core::errors::StorageError;
use fixloop_core::models::DecisionRecord;
use fixloop_core::traits::DecisionFilter;

use super::{from_json, to_json, to_micros};
use crate::pagination::PaginationCursor;
use crate::to_storage_err;

/// `INSERT OR IGNORE`: the first write of a decision id wins.
pub fn insert_decision(conn: &Connection, record: &DecisionRecord) -> Result<bool, StorageError> {
    let inserted = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO decisions
                 (decision_id, decision_type, selected_candidate, timestamp, payload, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(to_storage_err)?
        .execute(params![
            record.decision_id,
            record.decision_type.name(),
            record.selected_candidate,
            to_micros(record.timestamp),
            to_json(record)?,
            to_micros(record.stored_at),
        ])
        .map_err(to_storage_err)?;
    Ok(inserted == 1)
}

pub fn record_attempt(
    conn: &Connection,
    decision_id: &str,
    correlation_id: Option<&str>,
    inserted: bool,
    at: DateTime<Utc>,
) -> Result<(), StorageError> {
    conn.prepare_cached(
        "INSERT INTO store_attempts (decision_id, correlation_id, outcome, attempted_at)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .map_err(to_storage_err)?
    .execute(params![
        decision_id,
        correlation_id,
        if inserted { "inserted" } else { "duplicate" },
        to_micros(at),
    ])
    .map_err(to_storage_err)?;
    Ok(())
}

/// Correlation ids of duplicate store attempts, oldest first.
pub fn duplicate_attempts(conn: &Connection, decision_id: &str) -> Result<Vec<Option<String>>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT correlation_id FROM store_attempts
             WHERE decision_id = ?1 AND outcome = 'duplicate'
             ORDER BY id ASC",
        )
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params![decision_id], |row| row.get(0))
        .map_err(to_storage_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(to_storage_err)
}

pub fn get_decision(conn: &Connection, decision_id: &str) -> Result<Option<DecisionRecord>, StorageError> {
    let payload: Option<String> = conn
        .prepare_cached("SELECT payload FROM decisions WHERE decision_id = ?1")
        .map_err(to_storage_err)?
        .query_row(params![decision_id], |row| row.get(0))
        .optional()
        .map_err(to_storage_err)?;
    payload.as_deref().map(from_json).transpose()
}

/// Up to `fetch` records after `after`, ordered by (timestamp, decision_id).
pub fn list_decisions(
    conn: &Connection,
    filter: &DecisionFilter,
    after: Option<&PaginationCursor>,
    fetch: usize,
) -> Result<Vec<DecisionRecord>, StorageError> {
    let (column, value) = match filter {
        DecisionFilter::All => (None, None),
        DecisionFilter::ByType(t) => (Some("decision_type"), Some(t.name().to_string())),
        DecisionFilter::BySelectedCandidate(c) => (Some("selected_candidate"), Some(c.clone())),
    };
    let filter_sql = match column {
        Some(col) => format!("{col} = ?1"),
        None => "?1 IS NULL".to_string(),
    };
    let sql = format!(
        "SELECT payload FROM decisions
         WHERE {filter_sql}
           AND (?2 IS NULL OR (timestamp, decision_id) > (?2, ?3))
         ORDER BY timestamp ASC, decision_id ASC
         LIMIT ?4"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(to_storage_err)?;
    let payloads = stmt
        .query_map(
            params![
                value,
                after.map(|c| c.last_sort_value),
                after.map(|c| c.last_id.as_str()),
                fetch as i64,
            ],
            |row| row.get::<_, String>(0),
        )
        .map_err(to_storage_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_storage_err)?;
    payloads.iter().map(|p| from_json(p)).collect()
}

/// The keyset cursor a listing row continues from.
pub fn cursor_of(record: &DecisionRecord) -> PaginationCursor {
    PaginationCursor {
        last_sort_value: to_micros(record.timestamp),
        last_id: record.decision_id.clone(),
    }
}
