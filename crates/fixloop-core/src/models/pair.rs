//! The derived finding/fix pairing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a fix was associated with its finding, in decreasing confidence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingType {
    Autofix,
    SameCommit,
    SamePr,
    Temporal,
    Inferred,
}

impl PairingType {
    pub const ALL: [PairingType; 5] = [
        Self::Autofix,
        Self::SameCommit,
        Self::SamePr,
        Self::Temporal,
        Self::Inferred,
    ];

    /// Higher rank means stronger evidence.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Autofix => 4,
            Self::SameCommit => 3,
            Self::SamePr => 2,
            Self::Temporal => 1,
            Self::Inferred => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Autofix => "autofix",
            Self::SameCommit => "same_commit",
            Self::SamePr => "same_pr",
            Self::Temporal => "temporal",
            Self::Inferred => "inferred",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == s)
    }
}

impl fmt::Display for PairingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A finding paired with the fix that addressed it.
///
/// `diff_hunks` is a copy so the pair outlives its source events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingFixPair {
    pub pair_id: String,
    pub finding_id: Uuid,
    pub fix_commit_sha: String,
    pub diff_hunks: Vec<String>,
    pub confidence_score: f64,
    pub disappearance_confirmed: bool,
    pub pairing_type: PairingType,
    pub created_at: DateTime<Utc>,
    pub repo: String,
    pub rule_id: String,
    pub file_path: String,
    /// Whether the scorer judged this pair strong enough to feed patterns.
    pub promoted: bool,
}

impl FindingFixPair {
    /// Deterministic pair identity, stable across redelivery.
    pub fn derive_id(finding_id: &Uuid, fix_commit_sha: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(finding_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(fix_commit_sha.as_bytes());
        format!("pair-{}", &hasher.finalize().to_hex()[..32])
    }
}
