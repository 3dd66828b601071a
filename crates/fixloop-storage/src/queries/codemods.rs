//! Codemod queries.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use fixloop_core::errors::StorageError;
use fixloop_core::models::{CodemodDefinition, CodemodStatus, ReplayResult};

use super::{from_json, to_json, to_micros};
use crate::to_storage_err;

const COLUMNS: &str = "codemod_id, pattern_id, rule_id, language, codemod_source, \
     transform_signature, status, replay_result";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(CodemodDefinition, String, Option<String>)> {
    Ok((
        CodemodDefinition {
            codemod_id: row.get(0)?,
            pattern_id: row.get(1)?,
            rule_id: row.get(2)?,
            language: row.get(3)?,
            codemod_source: row.get(4)?,
            transform_signature: row.get(5)?,
            status: CodemodStatus::Pending,
            replay_result: None,
        },
        row.get(6)?,
        row.get(7)?,
    ))
}

fn decode(
    (mut codemod, status, replay): (CodemodDefinition, String, Option<String>),
) -> Result<CodemodDefinition, StorageError> {
    codemod.status = CodemodStatus::parse(&status).ok_or_else(|| StorageError::Serialization {
        message: format!("unknown codemod status '{status}'"),
    })?;
    codemod.replay_result = replay
        .as_deref()
        .map(from_json::<ReplayResult>)
        .transpose()?;
    Ok(codemod)
}

/// Returns `false` when the codemod id already existed.
pub fn insert_codemod(
    conn: &Connection,
    codemod: &CodemodDefinition,
    at: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let replay = codemod.replay_result.as_ref().map(to_json).transpose()?;
    let inserted = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO codemods (codemod_id, pattern_id, rule_id, language,
                 codemod_source, transform_signature, status, replay_passed, replay_result, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .map_err(to_storage_err)?
        .execute(params![
            codemod.codemod_id,
            codemod.pattern_id,
            codemod.rule_id,
            codemod.language,
            codemod.codemod_source,
            codemod.transform_signature,
            codemod.status.name(),
            codemod.is_exposable(),
            replay,
            to_micros(at),
        ])
        .map_err(to_storage_err)?;
    Ok(inserted == 1)
}

/// Validated codemods with a complete passing replay.
pub fn list_exposable(conn: &Connection, rule_id: Option<&str>) -> Result<Vec<CodemodDefinition>, StorageError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM codemods
         WHERE status = 'validated' AND replay_passed = 1 AND (?1 IS NULL OR rule_id = ?1)
         ORDER BY rule_id ASC, codemod_id ASC"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params![rule_id], map_row)
        .map_err(to_storage_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_storage_err)?;
    rows.into_iter().map(decode).collect()
}

/// Exempt: any status.
pub fn get_by_id(conn: &Connection, codemod_id: &str) -> Result<Option<CodemodDefinition>, StorageError> {
    let sql = format!("SELECT {COLUMNS} FROM codemods WHERE codemod_id = ?1");
    conn.prepare_cached(&sql)
        .map_err(to_storage_err)?
        .query_row(params![codemod_id], map_row)
        .optional()
        .map_err(to_storage_err)?
        .map(decode)
        .transpose()
}
