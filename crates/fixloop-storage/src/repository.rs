//! `PatternRepository` adapter over the storage runtime.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use fixloop_core::errors::StorageError;
use fixloop_core::models::LearnedPattern;
use fixloop_core::traits::PatternRepository;

use crate::engine::StorageEngine;
use crate::queries::patterns;

#[derive(Debug, Clone)]
pub struct SqlitePatternRepository {
    engine: Arc<StorageEngine>,
}

impl SqlitePatternRepository {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }
}

impl PatternRepository for SqlitePatternRepository {
    fn store_pattern(&self, pattern: &LearnedPattern) -> Result<bool, StorageError> {
        let inserted = self
            .engine
            .with_writer(|conn| patterns::insert_pattern(conn, pattern))?;
        if inserted {
            tracing::debug!(
                pattern_id = %pattern.pattern_id,
                signature = %pattern.signature,
                state = %pattern.state,
                "pattern stored"
            );
        }
        Ok(inserted)
    }

    fn check_exists(&self, signature: &str, domain: &str) -> Result<bool, StorageError> {
        self.engine
            .with_reader(|conn| patterns::exists_in_lineage(conn, signature, domain))
    }

    fn check_exists_by_id(&self, pattern_id: &str) -> Result<bool, StorageError> {
        self.engine
            .with_reader(|conn| patterns::exists_by_id(conn, pattern_id))
    }

    fn set_not_current(&self, signature: &str, domain: &str) -> Result<usize, StorageError> {
        self.engine
            .with_writer(|conn| patterns::set_not_current(conn, signature, domain))
    }

    fn get_latest_version(
        &self,
        signature: &str,
        domain: &str,
    ) -> Result<Option<u32>, StorageError> {
        self.engine
            .with_reader(|conn| patterns::latest_version(conn, signature, domain))
    }

    fn get_stored_at(&self, pattern_id: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        self.engine
            .with_reader(|conn| patterns::stored_at(conn, pattern_id))
    }

    fn list_validated_patterns(
        &self,
        domain: Option<&str>,
    ) -> Result<Vec<LearnedPattern>, StorageError> {
        self.engine
            .with_reader(|conn| patterns::list_validated(conn, domain))
    }

    fn list_by_domain(&self, domain: &str) -> Result<Vec<LearnedPattern>, StorageError> {
        self.engine
            .with_reader(|conn| patterns::list_injectable_by_domain(conn, domain))
    }

    fn get_pattern(
        &self,
        pattern_type: &str,
        domain: &str,
    ) -> Result<Option<LearnedPattern>, StorageError> {
        self.engine
            .with_reader(|conn| patterns::get_injectable(conn, pattern_type, domain))
    }

    fn list_promotion_candidates(
        &self,
        domain: Option<&str>,
    ) -> Result<Vec<LearnedPattern>, StorageError> {
        self.engine
            .with_reader(|conn| patterns::list_promotion_candidates(conn, domain))
    }

    fn list_demotion_candidates(
        &self,
        domain: Option<&str>,
    ) -> Result<Vec<LearnedPattern>, StorageError> {
        self.engine
            .with_reader(|conn| patterns::list_demotion_candidates(conn, domain))
    }

    fn get_latest_by_lineage(
        &self,
        signature: &str,
        domain: &str,
    ) -> Result<Option<LearnedPattern>, StorageError> {
        self.engine
            .with_reader(|conn| patterns::latest_by_lineage(conn, signature, domain))
    }

    fn get_pattern_admin(&self, pattern_id: &str) -> Result<Option<LearnedPattern>, StorageError> {
        self.engine
            .with_reader(|conn| patterns::get_by_id(conn, pattern_id))
    }

    fn promote_version(&self, pattern: &LearnedPattern) -> Result<bool, StorageError> {
        let promoted = self.engine.with_transaction(|conn| {
            if patterns::exists_by_id(conn, &pattern.pattern_id)? {
                return Ok(false);
            }
            let retired = patterns::set_not_current(conn, &pattern.signature, &pattern.domain)?;
            let inserted = patterns::insert_pattern(conn, pattern)?;
            if !inserted {
                return Err(StorageError::SqliteError {
                    message: format!(
                        "version {} of {} conflicts with an existing row",
                        pattern.version, pattern.signature
                    ),
                });
            }
            tracing::debug!(retired, "lineage current row replaced");
            Ok(true)
        })?;
        if promoted {
            tracing::info!(
                pattern_id = %pattern.pattern_id,
                signature = %pattern.signature,
                domain = %pattern.domain,
                version = pattern.version,
                state = %pattern.state,
                "pattern version written"
            );
        }
        Ok(promoted)
    }

    fn record_evaluation(&self, pattern: &LearnedPattern) -> Result<bool, StorageError> {
        self.engine
            .with_writer(|conn| patterns::update_evaluation(conn, pattern))
    }
}
