//! Schema migrations tracked in `PRAGMA user_version`.

pub mod v001_initial;
pub mod v002_sync;

use rusqlite::Connection;

use fixloop_core::errors::StorageError;

use crate::connection::with_immediate_transaction;
use crate::to_storage_err;

/// Ordered (version, sql) pairs. Versions are contiguous from 1.
const MIGRATIONS: &[(u32, &str)] = &[
    (1, v001_initial::MIGRATION_SQL),
    (2, v002_sync::MIGRATION_SQL),
];

/// Latest schema version this build knows.
pub const LATEST_VERSION: u32 = 2;

pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(to_storage_err)
}

/// Apply every migration above the database's `user_version`, each in its
/// own transaction. Returns the number applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, StorageError> {
    let current = current_version(conn)?;
    if current > LATEST_VERSION {
        return Err(StorageError::MigrationFailed {
            version: current,
            message: format!("database is newer than this build (v{LATEST_VERSION})"),
        });
    }

    let mut applied = 0;
    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        with_immediate_transaction(conn, |tx| {
            tx.execute_batch(sql)
                .map_err(|e| StorageError::MigrationFailed {
                    version,
                    message: e.to_string(),
                })?;
            tx.pragma_update(None, "user_version", version)
                .map_err(|e| StorageError::MigrationFailed {
                    version,
                    message: e.to_string(),
                })
        })?;
        tracing::debug!(version, "applied migration");
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), LATEST_VERSION);
        assert_eq!(run_migrations(&conn).unwrap(), 0);
    }

    #[test]
    fn newer_database_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", LATEST_VERSION + 1)
            .unwrap();
        assert!(matches!(
            run_migrations(&conn),
            Err(StorageError::MigrationFailed { .. })
        ));
    }
}
