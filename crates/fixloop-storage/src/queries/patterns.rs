//! Learned pattern queries.
//!
//! Injection-eligible reads filter `is_current = 1 AND state IN
//! ('validated', 'provisional')` in SQL and order validated first.
//! Administrative reads are marked as exempt.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params};

use fixloop_core::errors::StorageError;
use fixloop_core::models::{ConfidenceComponents, LearnedPattern, PatternState};

use super::{from_json, from_micros, to_json, to_micros};
use crate::to_storage_err;

const COLUMNS: &str = "pattern_id, signature, domain, version, pattern_type, confidence, \
     label_agreement, cluster_cohesion, frequency_factor, state, is_current, member_count, \
     sustained_runs, member_ids, stored_at, source_run_id, correlation_id";

const INJECTABLE_ORDER: &str =
    "ORDER BY CASE state WHEN 'validated' THEN 0 ELSE 1 END, confidence DESC, pattern_id ASC";

/// Raw row before enum and JSON decoding.
struct PatternRow {
    pattern_id: String,
    signature: String,
    domain: String,
    version: u32,
    pattern_type: String,
    confidence: f64,
    label_agreement: f64,
    cluster_cohesion: f64,
    frequency_factor: f64,
    state: String,
    is_current: bool,
    member_count: u32,
    sustained_runs: u32,
    member_ids: String,
    stored_at: i64,
    source_run_id: Option<String>,
    correlation_id: Option<String>,
}

impl PatternRow {
    fn map(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pattern_id: row.get(0)?,
            signature: row.get(1)?,
            domain: row.get(2)?,
            version: row.get(3)?,
            pattern_type: row.get(4)?,
            confidence: row.get(5)?,
            label_agreement: row.get(6)?,
            cluster_cohesion: row.get(7)?,
            frequency_factor: row.get(8)?,
            state: row.get(9)?,
            is_current: row.get(10)?,
            member_count: row.get(11)?,
            sustained_runs: row.get(12)?,
            member_ids: row.get(13)?,
            stored_at: row.get(14)?,
            source_run_id: row.get(15)?,
            correlation_id: row.get(16)?,
        })
    }

    fn into_pattern(self) -> Result<LearnedPattern, StorageError> {
        let state = PatternState::parse(&self.state).ok_or_else(|| StorageError::Serialization {
            message: format!("unknown pattern state '{}'", self.state),
        })?;
        Ok(LearnedPattern {
            pattern_id: self.pattern_id,
            signature: self.signature,
            domain: self.domain,
            version: self.version,
            pattern_type: self.pattern_type,
            confidence: self.confidence,
            components: ConfidenceComponents {
                label_agreement: self.label_agreement,
                cluster_cohesion: self.cluster_cohesion,
                frequency_factor: self.frequency_factor,
            },
            state,
            is_current: self.is_current,
            member_count: self.member_count,
            sustained_runs: self.sustained_runs,
            member_ids: from_json(&self.member_ids)?,
            stored_at: from_micros(self.stored_at)?,
            source_run_id: self.source_run_id,
            correlation_id: self.correlation_id,
        })
    }
}

fn query_many<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<LearnedPattern>, StorageError> {
    let mut stmt = conn.prepare_cached(sql).map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params, PatternRow::map)
        .map_err(to_storage_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_storage_err)?;
    rows.into_iter().map(PatternRow::into_pattern).collect()
}

fn query_one<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<LearnedPattern>, StorageError> {
    let mut stmt = conn.prepare_cached(sql).map_err(to_storage_err)?;
    stmt.query_row(params, PatternRow::map)
        .optional()
        .map_err(to_storage_err)?
        .map(PatternRow::into_pattern)
        .transpose()
}

/// Insert a row. Returns `false` when the id, the (signature, domain,
/// version) triple, or the lineage's current slot is already taken.
pub fn insert_pattern(conn: &Connection, p: &LearnedPattern) -> Result<bool, StorageError> {
    let inserted = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO patterns (pattern_id, signature, domain, version, pattern_type,
                 confidence, label_agreement, cluster_cohesion, frequency_factor, state, is_current,
                 member_count, sustained_runs, member_ids, stored_at, source_run_id, correlation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )
        .map_err(to_storage_err)?
        .execute(params![
            p.pattern_id,
            p.signature,
            p.domain,
            p.version,
            p.pattern_type,
            p.confidence,
            p.components.label_agreement,
            p.components.cluster_cohesion,
            p.components.frequency_factor,
            p.state.name(),
            p.is_current,
            p.member_count,
            p.sustained_runs,
            to_json(&p.member_ids)?,
            to_micros(p.stored_at),
            p.source_run_id,
            p.correlation_id,
        ])
        .map_err(to_storage_err)?;
    Ok(inserted == 1)
}

/// Overwrite the evaluation fields of an existing row.
pub fn update_evaluation(conn: &Connection, p: &LearnedPattern) -> Result<bool, StorageError> {
    let updated = conn
        .prepare_cached(
            "UPDATE patterns SET confidence = ?2, label_agreement = ?3, cluster_cohesion = ?4,
                 frequency_factor = ?5, member_count = ?6, sustained_runs = ?7, member_ids = ?8
             WHERE pattern_id = ?1",
        )
        .map_err(to_storage_err)?
        .execute(params![
            p.pattern_id,
            p.confidence,
            p.components.label_agreement,
            p.components.cluster_cohesion,
            p.components.frequency_factor,
            p.member_count,
            p.sustained_runs,
            to_json(&p.member_ids)?,
        ])
        .map_err(to_storage_err)?;
    Ok(updated == 1)
}

pub fn exists_in_lineage(conn: &Connection, signature: &str, domain: &str) -> Result<bool, StorageError> {
    conn.prepare_cached("SELECT EXISTS(SELECT 1 FROM patterns WHERE signature = ?1 AND domain = ?2)")
        .map_err(to_storage_err)?
        .query_row(params![signature, domain], |row| row.get(0))
        .map_err(to_storage_err)
}

pub fn exists_by_id(conn: &Connection, pattern_id: &str) -> Result<bool, StorageError> {
    conn.prepare_cached("SELECT EXISTS(SELECT 1 FROM patterns WHERE pattern_id = ?1)")
        .map_err(to_storage_err)?
        .query_row(params![pattern_id], |row| row.get(0))
        .map_err(to_storage_err)
}

pub fn set_not_current(conn: &Connection, signature: &str, domain: &str) -> Result<usize, StorageError> {
    conn.prepare_cached(
        "UPDATE patterns SET is_current = 0
         WHERE signature = ?1 AND domain = ?2 AND is_current = 1",
    )
    .map_err(to_storage_err)?
    .execute(params![signature, domain])
    .map_err(to_storage_err)
}

pub fn latest_version(conn: &Connection, signature: &str, domain: &str) -> Result<Option<u32>, StorageError> {
    conn.prepare_cached("SELECT MAX(version) FROM patterns WHERE signature = ?1 AND domain = ?2")
        .map_err(to_storage_err)?
        .query_row(params![signature, domain], |row| row.get(0))
        .map_err(to_storage_err)
}

pub fn stored_at(conn: &Connection, pattern_id: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
    let micros: Option<i64> = conn
        .prepare_cached("SELECT stored_at FROM patterns WHERE pattern_id = ?1")
        .map_err(to_storage_err)?
        .query_row(params![pattern_id], |row| row.get(0))
        .optional()
        .map_err(to_storage_err)?;
    micros.map(from_micros).transpose()
}

/// Injection-eligible: current validated rows.
pub fn list_validated(conn: &Connection, domain: Option<&str>) -> Result<Vec<LearnedPattern>, StorageError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM patterns
         WHERE is_current = 1 AND state = 'validated' AND (?1 IS NULL OR domain = ?1)
         {INJECTABLE_ORDER}"
    );
    query_many(conn, &sql, params![domain])
}

/// Injection-eligible: current validated and provisional rows of a domain.
pub fn list_injectable_by_domain(conn: &Connection, domain: &str) -> Result<Vec<LearnedPattern>, StorageError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM patterns
         WHERE is_current = 1 AND state IN ('validated', 'provisional') AND domain = ?1
         {INJECTABLE_ORDER}"
    );
    query_many(conn, &sql, params![domain])
}

/// Injection-eligible: best current row for a rule in a domain.
pub fn get_injectable(
    conn: &Connection,
    pattern_type: &str,
    domain: &str,
) -> Result<Option<LearnedPattern>, StorageError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM patterns
         WHERE is_current = 1 AND state IN ('validated', 'provisional')
           AND pattern_type = ?1 AND domain = ?2
         {INJECTABLE_ORDER}
         LIMIT 1"
    );
    query_one(conn, &sql, params![pattern_type, domain])
}

/// Exempt: current candidate and provisional rows.
pub fn list_promotion_candidates(
    conn: &Connection,
    domain: Option<&str>,
) -> Result<Vec<LearnedPattern>, StorageError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM patterns
         WHERE is_current = 1 AND state IN ('candidate', 'provisional') AND (?1 IS NULL OR domain = ?1)
         ORDER BY signature ASC, domain ASC"
    );
    query_many(conn, &sql, params![domain])
}

/// Exempt: current validated and provisional rows.
pub fn list_demotion_candidates(
    conn: &Connection,
    domain: Option<&str>,
) -> Result<Vec<LearnedPattern>, StorageError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM patterns
         WHERE is_current = 1 AND state IN ('validated', 'provisional') AND (?1 IS NULL OR domain = ?1)
         ORDER BY signature ASC, domain ASC"
    );
    query_many(conn, &sql, params![domain])
}

/// Exempt: highest version of a lineage, any state.
pub fn latest_by_lineage(
    conn: &Connection,
    signature: &str,
    domain: &str,
) -> Result<Option<LearnedPattern>, StorageError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM patterns
         WHERE signature = ?1 AND domain = ?2
         ORDER BY version DESC
         LIMIT 1"
    );
    query_one(conn, &sql, params![signature, domain])
}

/// Exempt: unfiltered point lookup.
pub fn get_by_id(conn: &Connection, pattern_id: &str) -> Result<Option<LearnedPattern>, StorageError> {
    let sql = format!("SELECT {COLUMNS} FROM patterns WHERE pattern_id = ?1");
    query_one(conn, &sql, params![pattern_id])
}
