//! StorageEngine: owns the writer and the read pool, runs migrations, and
//! implements the decision, codemod, pair, watermark and publication stores.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use fixloop_core::config::StorageConfig;
use fixloop_core::errors::StorageError;
use fixloop_core::models::{CodemodDefinition, DecisionRecord, FindingFixPair, Visibility};
use fixloop_core::traits::{
    CodemodStore, DecisionFilter, DecisionStore, Page, PairStore, PublicationLedger,
    WatermarkStore,
};

use crate::connection::{apply_pragmas, with_immediate_transaction, ReadPool};
use crate::migrations;
use crate::pagination::{finish_page, PaginationCursor};
use crate::queries::{codemods, decisions, pairs, sync};
use crate::to_storage_err;

/// The storage runtime.
///
/// File-backed engines read through the pool. In-memory engines route
/// reads through the writer, because a second in-memory connection is a
/// separate database.
pub struct StorageEngine {
    writer: Mutex<Connection>,
    readers: Option<ReadPool>,
    path: Option<PathBuf>,
    page_size: usize,
}

impl StorageEngine {
    pub fn open(path: &Path, config: &StorageConfig) -> Result<Self, StorageError> {
        let writer = Connection::open(path).map_err(to_storage_err)?;
        apply_pragmas(&writer)?;
        migrations::run_migrations(&writer)?;
        let readers = ReadPool::open(path, config.effective_read_pool_size())?;
        tracing::info!(path = %path.display(), readers = readers.size(), "storage opened");
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Some(readers),
            path: Some(path.to_path_buf()),
            page_size: config.effective_page_size(),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let writer = Connection::open_in_memory().map_err(to_storage_err)?;
        apply_pragmas(&writer)?;
        migrations::run_migrations(&writer)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: None,
            path: None,
            page_size: StorageConfig::default().effective_page_size(),
        })
    }

    /// Open the configured database, or an in-memory one when no path is set.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        match &config.database_path {
            Some(path) => Self::open(Path::new(path), config),
            None => Self::open_in_memory(),
        }
    }

    pub fn with_writer<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let guard = self
            .writer
            .lock()
            .map_err(|_| StorageError::LockPoisoned("writer".to_string()))?;
        f(&guard)
    }

    pub fn with_reader<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        match &self.readers {
            Some(pool) => pool.with_conn(f),
            None => self.with_writer(f),
        }
    }

    /// Writer connection inside one BEGIN IMMEDIATE transaction.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        self.with_writer(|conn| with_immediate_transaction(conn, |tx| f(tx)))
    }

    /// WAL checkpoint (TRUNCATE). A no-op for in-memory databases.
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        if self.path.is_none() {
            return Ok(());
        }
        self.with_writer(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(to_storage_err)
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Correlation ids recorded for duplicate stores of a decision.
    pub fn duplicate_decision_attempts(
        &self,
        decision_id: &str,
    ) -> Result<Vec<Option<String>>, StorageError> {
        self.with_reader(|conn| decisions::duplicate_attempts(conn, decision_id))
    }
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("path", &self.path)
            .field("readers", &self.readers)
            .finish()
    }
}

impl DecisionStore for StorageEngine {
    fn store_decision(
        &self,
        record: &DecisionRecord,
        correlation_id: Option<&str>,
    ) -> Result<bool, StorageError> {
        let inserted = self.with_transaction(|conn| {
            let inserted = decisions::insert_decision(conn, record)?;
            decisions::record_attempt(conn, &record.decision_id, correlation_id, inserted, Utc::now())?;
            Ok(inserted)
        })?;
        if !inserted {
            tracing::info!(
                decision_id = %record.decision_id,
                correlation_id = correlation_id.unwrap_or("-"),
                "duplicate decision ignored"
            );
        }
        Ok(inserted)
    }

    fn get_decision(
        &self,
        decision_id: &str,
        visibility: Visibility,
    ) -> Result<Option<DecisionRecord>, StorageError> {
        let record = self.with_reader(|conn| decisions::get_decision(conn, decision_id))?;
        Ok(record.map(|r| r.into_layer(visibility)))
    }

    fn list_decisions(
        &self,
        filter: &DecisionFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page<DecisionRecord>, StorageError> {
        let after = cursor.map(PaginationCursor::decode).transpose()?;
        let limit = if limit == 0 { self.page_size } else { limit };
        let rows = self.with_reader(|conn| {
            decisions::list_decisions(conn, filter, after.as_ref(), limit + 1)
        })?;
        let mut page = finish_page(rows, limit, decisions::cursor_of)?;
        page.items = page
            .items
            .into_iter()
            .map(|r| r.into_layer(Visibility::Layer1))
            .collect();
        Ok(page)
    }
}

impl CodemodStore for StorageEngine {
    fn store_codemod(&self, codemod: &CodemodDefinition) -> Result<bool, StorageError> {
        self.with_writer(|conn| codemods::insert_codemod(conn, codemod, Utc::now()))
    }

    fn list_validated_codemods(
        &self,
        rule_id: Option<&str>,
    ) -> Result<Vec<CodemodDefinition>, StorageError> {
        self.with_reader(|conn| codemods::list_exposable(conn, rule_id))
    }

    fn get_codemod_admin(
        &self,
        codemod_id: &str,
    ) -> Result<Option<CodemodDefinition>, StorageError> {
        self.with_reader(|conn| codemods::get_by_id(conn, codemod_id))
    }
}

impl PairStore for StorageEngine {
    fn store_pair(&self, pair: &FindingFixPair) -> Result<bool, StorageError> {
        self.with_writer(|conn| pairs::upsert_pair(conn, pair))
    }

    fn list_promoted_pairs_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<FindingFixPair>, StorageError> {
        self.with_reader(|conn| pairs::promoted_since(conn, since))
    }

    fn latest_promoted_pair_at(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.with_reader(pairs::latest_promoted_at)
    }
}

impl WatermarkStore for StorageEngine {
    fn get_watermark(&self, name: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.with_reader(|conn| sync::get_watermark(conn, name))
    }

    fn set_watermark(&self, name: &str, value: DateTime<Utc>) -> Result<(), StorageError> {
        self.with_writer(|conn| sync::advance_watermark(conn, name, value, Utc::now()))
    }
}

impl PublicationLedger for StorageEngine {
    fn record_publication(&self, key: &str, kind: &str) -> Result<bool, StorageError> {
        self.with_writer(|conn| sync::record_publication(conn, key, kind, Utc::now()))
    }

    fn release_publication(&self, key: &str) -> Result<bool, StorageError> {
        self.with_writer(|conn| sync::forget_publication(conn, key))
    }
}
