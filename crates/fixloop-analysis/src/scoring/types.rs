//! Scoring inputs and outputs.

use serde::{Deserialize, Serialize};

/// Evidence signals for one finding/fix pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringContext {
    pub rule_id_matched: bool,
    pub diff_removes_token: bool,
    pub disappearance_confirmed: bool,
    pub anchored_to_hunk: bool,
    pub ambiguous_commits: bool,
    pub disappears_without_modification: bool,
    pub config_change_detected: bool,
    pub candidate_commit_count: u32,
    pub is_formatter_batch: bool,
}

impl ScoringContext {
    /// Attribution is ambiguous when flagged or when more than one commit
    /// could have been the fix.
    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous_commits || self.candidate_commit_count > 1
    }
}

/// Signed contribution of each signal to the raw score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub rule_id_match: f64,
    pub diff_removes_token: f64,
    pub disappearance_confirmed: f64,
    pub anchored_to_hunk: f64,
    pub ambiguous_commits: f64,
    pub disappears_without_modification: f64,
    pub config_change_detected: f64,
}

/// Scorer verdict for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Clamped to [0, 1].
    pub confidence_score: f64,
    /// Unclamped sum, kept for diagnostics.
    pub raw_score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub promoted: bool,
    pub is_formatter_batch: bool,
}
