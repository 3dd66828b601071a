//! Learned patterns and their lifecycle state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a learned pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternState {
    Candidate,
    Provisional,
    Validated,
    Deprecated,
}

impl PatternState {
    pub const ALL: [PatternState; 4] = [
        Self::Candidate,
        Self::Provisional,
        Self::Validated,
        Self::Deprecated,
    ];

    /// States that may ever be selected for automatic application.
    pub const INJECTABLE: [PatternState; 2] = [Self::Validated, Self::Provisional];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Provisional => "provisional",
            Self::Validated => "validated",
            Self::Deprecated => "deprecated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.name() == s)
    }

    pub fn is_injectable(&self) -> bool {
        Self::INJECTABLE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deprecated)
    }
}

impl fmt::Display for PatternState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The three inputs of pattern promotion confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceComponents {
    pub label_agreement: f64,
    pub cluster_cohesion: f64,
    pub frequency_factor: f64,
}

/// One version of a learned pattern. Rows are never deleted; exactly one
/// row per (signature, domain) lineage has `is_current = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub pattern_id: String,
    pub signature: String,
    pub domain: String,
    pub version: u32,
    pub pattern_type: String,
    pub confidence: f64,
    pub components: ConfidenceComponents,
    pub state: PatternState,
    pub is_current: bool,
    pub member_count: u32,
    /// Consecutive evaluations at or above the validated threshold.
    pub sustained_runs: u32,
    pub member_ids: Vec<String>,
    pub stored_at: DateTime<Utc>,
    pub source_run_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl LearnedPattern {
    /// Deterministic id for a (signature, domain, version) row.
    pub fn derive_id(signature: &str, domain: &str, version: u32) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(signature.as_bytes());
        hasher.update(b"\0");
        hasher.update(domain.as_bytes());
        hasher.update(b"\0");
        hasher.update(&version.to_le_bytes());
        format!("pat-{}", &hasher.finalize().to_hex()[..32])
    }
}
