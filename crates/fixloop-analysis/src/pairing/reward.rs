//! Outcome rewards and per-pattern reward averages.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Observed outcome of applying (or offering) a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOutcome {
    AutofixAccepted,
    ManualFixConfirmed,
    Unresolved,
    Reverted,
    RepeatedViolation,
    Reintroduced,
}

impl FixOutcome {
    /// Reward in [-1, 1].
    pub fn reward(&self) -> f64 {
        match self {
            Self::AutofixAccepted => 1.0,
            Self::ManualFixConfirmed => 0.8,
            Self::Unresolved => -0.2,
            Self::Reverted => -0.8,
            Self::RepeatedViolation => -0.6,
            Self::Reintroduced => -1.0,
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, Self::RepeatedViolation | Self::Reintroduced)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardStats {
    pub average: f64,
    pub observations: u32,
    pub violations: u32,
    pub reintroductions: u32,
}

/// Exponential moving average of rewards, keyed by pattern lineage.
#[derive(Debug, Clone)]
pub struct RewardLedger {
    alpha: f64,
    entries: FxHashMap<String, RewardStats>,
}

impl RewardLedger {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            entries: FxHashMap::default(),
        }
    }

    /// Record an outcome; the first observation seeds the average.
    pub fn record(&mut self, key: &str, outcome: FixOutcome) -> RewardStats {
        let alpha = self.alpha;
        let stats = self.entries.entry(key.to_string()).or_default();
        let reward = outcome.reward();
        stats.average = if stats.observations == 0 {
            reward
        } else {
            alpha * reward + (1.0 - alpha) * stats.average
        };
        stats.observations += 1;
        if outcome.is_violation() {
            stats.violations += 1;
        }
        if outcome == FixOutcome::Reintroduced {
            stats.reintroductions += 1;
        }
        *stats
    }

    pub fn stats(&self, key: &str) -> RewardStats {
        self.entries.get(key).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewards_stay_in_unit_interval() {
        for outcome in [
            FixOutcome::AutofixAccepted,
            FixOutcome::ManualFixConfirmed,
            FixOutcome::Unresolved,
            FixOutcome::Reverted,
            FixOutcome::RepeatedViolation,
            FixOutcome::Reintroduced,
        ] {
            assert!((-1.0..=1.0).contains(&outcome.reward()));
        }
    }

    #[test]
    fn average_moves_toward_recent_outcomes() {
        let mut ledger = RewardLedger::new(0.5);
        ledger.record("p", FixOutcome::AutofixAccepted);
        let stats = ledger.record("p", FixOutcome::Reintroduced);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.observations, 2);
        assert_eq!(stats.violations, 1);
        assert_eq!(stats.reintroductions, 1);
        assert_eq!(ledger.stats("missing"), RewardStats::default());
    }
}
