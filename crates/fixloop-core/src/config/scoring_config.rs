//! Pair confidence scoring configuration.

use serde::{Deserialize, Serialize};

/// Configuration for finding/fix pair scoring.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScoringConfig {
    /// Minimum clamped score for a pair to be promoted. Default: 0.75.
    pub promotion_threshold: Option<f64>,
    /// Fraction of a PR's files a commit must exceed to count as a
    /// formatter batch. Default: 0.80.
    pub formatter_batch_ratio: Option<f64>,
}

impl ScoringConfig {
    pub fn effective_promotion_threshold(&self) -> f64 {
        self.promotion_threshold.unwrap_or(0.75)
    }

    pub fn effective_formatter_batch_ratio(&self) -> f64 {
        self.formatter_batch_ratio.unwrap_or(0.80)
    }
}
