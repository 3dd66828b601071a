//! Aggregate pairing health metrics.

use serde::{Deserialize, Serialize};

use fixloop_core::models::{FindingFixPair, PairingType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingMetrics {
    pub observed_findings: u64,
    pub pairs: u64,
    pub promoted_pairs: u64,
    pub reintroductions: u64,
    /// Pairs per observed finding.
    pub paired_rate: f64,
    /// Autofix pairs per pair.
    pub autofix_pct: f64,
    /// Reintroductions per confirmed pair.
    pub reintroduction_rate: f64,
    pub promoted_rate: f64,
}

impl PairingMetrics {
    pub fn compute(observed_findings: u64, pairs: &[FindingFixPair], reintroductions: u64) -> Self {
        let total = pairs.len() as u64;
        let autofix = pairs
            .iter()
            .filter(|p| p.pairing_type == PairingType::Autofix)
            .count() as u64;
        let confirmed = pairs.iter().filter(|p| p.disappearance_confirmed).count() as u64;
        let promoted = pairs.iter().filter(|p| p.promoted).count() as u64;

        Self {
            observed_findings,
            pairs: total,
            promoted_pairs: promoted,
            reintroductions,
            paired_rate: ratio(total, observed_findings),
            autofix_pct: ratio(autofix, total),
            reintroduction_rate: ratio(reintroductions, confirmed),
            promoted_rate: ratio(promoted, total),
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
