//! Persistence contracts. The SQLite adapters in `fixloop-storage`
//! implement these; the pipeline only sees the traits.

use chrono::{DateTime, Utc};

use crate::errors::StorageError;
use crate::models::{
    CodemodDefinition, DecisionRecord, DecisionType, FindingFixPair, LearnedPattern, Visibility,
};

/// One page of a keyset-paginated listing. `next_cursor` is `None`
/// exactly when no further page exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Filter for decision listings.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DecisionFilter {
    #[default]
    All,
    ByType(DecisionType),
    BySelectedCandidate(String),
}

/// Learned pattern repository.
///
/// Injection-eligible reads (`get_pattern`, `list_validated_patterns`,
/// `list_by_domain`) only ever return current rows in `validated` or
/// `provisional` state, validated first. The remaining reads are
/// administrative and see every state.
pub trait PatternRepository: Send + Sync {
    /// Insert a pattern row. Returns `false` when the id already existed.
    fn store_pattern(&self, pattern: &LearnedPattern) -> Result<bool, StorageError>;

    fn check_exists(&self, signature: &str, domain: &str) -> Result<bool, StorageError>;

    fn check_exists_by_id(&self, pattern_id: &str) -> Result<bool, StorageError>;

    /// Flip every current row of the lineage to not-current.
    fn set_not_current(&self, signature: &str, domain: &str) -> Result<usize, StorageError>;

    fn get_latest_version(&self, signature: &str, domain: &str)
        -> Result<Option<u32>, StorageError>;

    fn get_stored_at(&self, pattern_id: &str) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Injection-eligible: current validated patterns.
    fn list_validated_patterns(
        &self,
        domain: Option<&str>,
    ) -> Result<Vec<LearnedPattern>, StorageError>;

    /// Injection-eligible: current validated and provisional patterns of a domain.
    fn list_by_domain(&self, domain: &str) -> Result<Vec<LearnedPattern>, StorageError>;

    /// Injection-eligible: best current pattern for a rule in a domain,
    /// validated before provisional.
    fn get_pattern(
        &self,
        pattern_type: &str,
        domain: &str,
    ) -> Result<Option<LearnedPattern>, StorageError>;

    /// Exempt: current candidate and provisional rows.
    fn list_promotion_candidates(
        &self,
        domain: Option<&str>,
    ) -> Result<Vec<LearnedPattern>, StorageError>;

    /// Exempt: current validated rows (and provisional, which can also demote).
    fn list_demotion_candidates(
        &self,
        domain: Option<&str>,
    ) -> Result<Vec<LearnedPattern>, StorageError>;

    /// Exempt: the highest version of a lineage in any state.
    fn get_latest_by_lineage(
        &self,
        signature: &str,
        domain: &str,
    ) -> Result<Option<LearnedPattern>, StorageError>;

    /// Exempt: unfiltered point lookup.
    fn get_pattern_admin(&self, pattern_id: &str) -> Result<Option<LearnedPattern>, StorageError>;

    /// Atomically retire the lineage's current row and insert `pattern`
    /// as the new current version. Returns `false` if the row already existed.
    fn promote_version(&self, pattern: &LearnedPattern) -> Result<bool, StorageError>;

    /// Overwrite the evaluation fields (confidence, components, members,
    /// sustained runs) of an existing row. State and version are untouched.
    /// Returns `false` when no such row exists.
    fn record_evaluation(&self, pattern: &LearnedPattern) -> Result<bool, StorageError>;
}

/// First-write-wins decision audit store.
pub trait DecisionStore: Send + Sync {
    /// Returns `true` when newly inserted. A duplicate is recorded against
    /// `correlation_id` and leaves the original untouched.
    fn store_decision(
        &self,
        record: &DecisionRecord,
        correlation_id: Option<&str>,
    ) -> Result<bool, StorageError>;

    fn get_decision(
        &self,
        decision_id: &str,
        visibility: Visibility,
    ) -> Result<Option<DecisionRecord>, StorageError>;

    fn list_decisions(
        &self,
        filter: &DecisionFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page<DecisionRecord>, StorageError>;
}

/// Codemod persistence.
pub trait CodemodStore: Send + Sync {
    /// Returns `false` when the codemod id already existed.
    fn store_codemod(&self, codemod: &CodemodDefinition) -> Result<bool, StorageError>;

    /// Only validated codemods with a complete passing replay.
    fn list_validated_codemods(
        &self,
        rule_id: Option<&str>,
    ) -> Result<Vec<CodemodDefinition>, StorageError>;

    /// Exempt: any status.
    fn get_codemod_admin(&self, codemod_id: &str)
        -> Result<Option<CodemodDefinition>, StorageError>;
}

/// Durable copies of scored pairs, so pattern evidence outlives source events.
pub trait PairStore: Send + Sync {
    fn store_pair(&self, pair: &FindingFixPair) -> Result<bool, StorageError>;

    /// Promoted pairs created strictly after `since`, oldest first.
    fn list_promoted_pairs_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<FindingFixPair>, StorageError>;

    /// Newest `created_at` of any promoted pair.
    fn latest_promoted_pair_at(&self) -> Result<Option<DateTime<Utc>>, StorageError>;
}

/// Named durable high-water marks for incremental processing.
pub trait WatermarkStore: Send + Sync {
    fn get_watermark(&self, name: &str) -> Result<Option<DateTime<Utc>>, StorageError>;

    fn set_watermark(&self, name: &str, value: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Ledger of review publications, keyed by (pr, finding set).
pub trait PublicationLedger: Send + Sync {
    /// Returns `true` when the key was newly recorded.
    fn record_publication(&self, key: &str, kind: &str) -> Result<bool, StorageError>;

    /// Drop a recorded key so a failed publication can be retried.
    fn release_publication(&self, key: &str) -> Result<bool, StorageError>;
}
