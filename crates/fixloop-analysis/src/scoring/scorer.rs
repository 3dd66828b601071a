//! Pair confidence scorer.
//!
//! Additive evidence weights minus penalties, clamped to [0, 1]. Weights are
//! held in basis points so that sums such as 0.40 + 0.30 compare exactly
//! against configured thresholds.

use fixloop_core::config::ScoringConfig;

use super::types::{ScoreBreakdown, ScoreResult, ScoringContext};

pub const RULE_ID_MATCH_BP: i32 = 4_000;
pub const DIFF_REMOVES_TOKEN_BP: i32 = 3_000;
pub const DISAPPEARANCE_CONFIRMED_BP: i32 = 2_000;
pub const ANCHORED_TO_HUNK_BP: i32 = 1_000;
pub const AMBIGUOUS_COMMITS_PENALTY_BP: i32 = 2_000;
pub const DISAPPEARS_WITHOUT_MOD_PENALTY_BP: i32 = 1_500;
pub const CONFIG_CHANGE_PENALTY_BP: i32 = 1_000;

const BASIS: f64 = 10_000.0;

/// Stateless pair scorer.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    promotion_threshold: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl ConfidenceScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            promotion_threshold: config.effective_promotion_threshold(),
        }
    }

    pub fn promotion_threshold(&self) -> f64 {
        self.promotion_threshold
    }

    pub fn score(&self, ctx: &ScoringContext) -> ScoreResult {
        let signal = |on: bool, bp: i32| if on { bp } else { 0 };

        let rule = signal(ctx.rule_id_matched, RULE_ID_MATCH_BP);
        let token = signal(ctx.diff_removes_token, DIFF_REMOVES_TOKEN_BP);
        let confirmed = signal(ctx.disappearance_confirmed, DISAPPEARANCE_CONFIRMED_BP);
        let anchored = signal(ctx.anchored_to_hunk, ANCHORED_TO_HUNK_BP);
        let ambiguous = -signal(ctx.is_ambiguous(), AMBIGUOUS_COMMITS_PENALTY_BP);
        let no_mod = -signal(
            ctx.disappears_without_modification,
            DISAPPEARS_WITHOUT_MOD_PENALTY_BP,
        );
        let config = -signal(ctx.config_change_detected, CONFIG_CHANGE_PENALTY_BP);

        let raw_bp = rule + token + confirmed + anchored + ambiguous + no_mod + config;
        let raw_score = f64::from(raw_bp) / BASIS;
        let confidence_score = f64::from(raw_bp.clamp(0, 10_000)) / BASIS;

        let promoted = confidence_score >= self.promotion_threshold && !ctx.is_formatter_batch;

        ScoreResult {
            confidence_score,
            raw_score,
            score_breakdown: ScoreBreakdown {
                rule_id_match: f64::from(rule) / BASIS,
                diff_removes_token: f64::from(token) / BASIS,
                disappearance_confirmed: f64::from(confirmed) / BASIS,
                anchored_to_hunk: f64::from(anchored) / BASIS,
                ambiguous_commits: f64::from(ambiguous) / BASIS,
                disappears_without_modification: f64::from(no_mod) / BASIS,
                config_change_detected: f64::from(config) / BASIS,
            },
            promoted,
            is_formatter_batch: ctx.is_formatter_batch,
        }
    }
}

/// A commit is a formatter batch when it touches more than `ratio` of the
/// files changed in its pull request.
pub fn is_formatter_batch(commit_file_count: usize, pr_file_count: usize, ratio: f64) -> bool {
    if pr_file_count == 0 {
        return false;
    }
    commit_file_count as f64 / pr_file_count as f64 > ratio
}
