//! Write helpers: BEGIN IMMEDIATE transactions.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use fixloop_core::errors::StorageError;

use crate::to_storage_err;

/// Run `f` inside a BEGIN IMMEDIATE transaction. The write lock is taken
/// at transaction start; an error from `f` rolls everything back.
pub fn with_immediate_transaction<F, T>(conn: &Connection, f: F) -> Result<T, StorageError>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, StorageError>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(to_storage_err)?;
    let result = f(&tx)?;
    tx.commit().map_err(to_storage_err)?;
    Ok(result)
}
