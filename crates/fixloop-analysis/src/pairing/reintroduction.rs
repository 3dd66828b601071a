//! Detects previously fixed findings that reappear in later pull requests.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fixloop_core::models::FindingObserved;

/// Identity of a finding independent of its id: same rule, same file,
/// same normalized message, same repo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FindingFingerprint(String);

impl FindingFingerprint {
    pub fn of(finding: &FindingObserved) -> Self {
        let normalized = finding
            .normalized_message
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let mut hasher = blake3::Hasher::new();
        for part in [
            finding.repo.as_str(),
            finding.rule_id.as_str(),
            finding.file_path.as_str(),
            normalized.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        Self(hasher.finalize().to_hex()[..32].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A previously fixed finding reappeared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReintroductionSignal {
    pub fingerprint: FindingFingerprint,
    pub original_pair_id: String,
    pub original_pr_ordinal: u64,
    pub finding_id: Uuid,
    pub pr_id: String,
    pub rule_id: String,
    pub repo: String,
}

/// Records are swept for expiry once the map reaches this size.
const MIN_PRUNE_AT: usize = 1024;

#[derive(Debug, Clone)]
struct FixedRecord {
    pair_id: String,
    repo: String,
    pr_ordinal: u64,
}

/// Remembers confirmed fixes and flags reappearances within a bounded
/// number of subsequent pull requests. Fixes older than the window in
/// their repo are swept out as newer PRs arrive.
#[derive(Debug, Clone)]
pub struct ReintroductionTracker {
    pr_window: u64,
    fixed: FxHashMap<FindingFingerprint, FixedRecord>,
    latest_pr: FxHashMap<String, u64>,
    prune_at: usize,
}

impl ReintroductionTracker {
    pub fn new(pr_window: u32) -> Self {
        Self {
            pr_window: u64::from(pr_window),
            fixed: FxHashMap::default(),
            latest_pr: FxHashMap::default(),
            prune_at: MIN_PRUNE_AT,
        }
    }

    /// Remember that `finding` was fixed by `pair_id` in PR `pr_ordinal`.
    pub fn record_fix(&mut self, finding: &FindingObserved, pair_id: &str, pr_ordinal: u64) {
        self.see_pr(&finding.repo, pr_ordinal);
        self.fixed.insert(
            FindingFingerprint::of(finding),
            FixedRecord {
                pair_id: pair_id.to_string(),
                repo: finding.repo.clone(),
                pr_ordinal,
            },
        );
        if self.fixed.len() >= self.prune_at {
            self.prune();
        }
    }

    fn see_pr(&mut self, repo: &str, pr_ordinal: u64) {
        match self.latest_pr.get_mut(repo) {
            Some(latest) => *latest = (*latest).max(pr_ordinal),
            None => {
                self.latest_pr.insert(repo.to_string(), pr_ordinal);
            }
        }
    }

    /// Drop every fix that no later observation can reintroduce.
    fn prune(&mut self) {
        let before = self.fixed.len();
        let (window, latest_pr) = (self.pr_window, &self.latest_pr);
        self.fixed.retain(|_, record| {
            latest_pr
                .get(&record.repo)
                .map_or(true, |latest| latest.saturating_sub(record.pr_ordinal) <= window)
        });
        self.prune_at = (self.fixed.len() * 2).max(MIN_PRUNE_AT);
        tracing::debug!(before, after = self.fixed.len(), "expired fixes pruned");
    }

    /// Check a new observation. Observations past the window expire the record.
    pub fn check(
        &mut self,
        finding: &FindingObserved,
        pr_ordinal: u64,
    ) -> Option<ReintroductionSignal> {
        self.see_pr(&finding.repo, pr_ordinal);
        let fingerprint = FindingFingerprint::of(finding);
        let record = self.fixed.get(&fingerprint)?;
        if pr_ordinal <= record.pr_ordinal {
            return None;
        }
        if pr_ordinal - record.pr_ordinal > self.pr_window {
            self.fixed.remove(&fingerprint);
            return None;
        }
        let signal = ReintroductionSignal {
            original_pair_id: record.pair_id.clone(),
            original_pr_ordinal: record.pr_ordinal,
            fingerprint: fingerprint.clone(),
            finding_id: finding.finding_id,
            pr_id: finding.pr_id.clone(),
            rule_id: finding.rule_id.clone(),
            repo: finding.repo.clone(),
        };
        self.fixed.remove(&fingerprint);
        Some(signal)
    }

    pub fn tracked(&self) -> usize {
        self.fixed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fixloop_core::models::Severity;

    fn finding(file: &str) -> FindingObserved {
        FindingObserved {
            finding_id: Uuid::new_v4(),
            repo: "acme/api".into(),
            pr_id: "pr".into(),
            rule_id: "PY-EVAL".into(),
            severity: Severity::Warning,
            file_path: file.into(),
            line_start: 3,
            line_end: None,
            tool_name: "pylint".into(),
            tool_version: "3.1".into(),
            normalized_message: "use of eval".into(),
            raw_message: "use of eval".into(),
            commit_sha_observed: "c0".into(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn reappearance_inside_the_window_is_flagged_once() {
        let mut tracker = ReintroductionTracker::new(3);
        tracker.record_fix(&finding("a.py"), "pair-1", 1);
        let signal = tracker.check(&finding("a.py"), 3).unwrap();
        assert_eq!(signal.original_pair_id, "pair-1");
        assert!(tracker.check(&finding("a.py"), 4).is_none());
    }

    #[test]
    fn expired_fixes_do_not_accumulate() {
        let mut tracker = ReintroductionTracker::new(2);
        for pr in 0..5_000u64 {
            tracker.record_fix(&finding(&format!("f{pr}.py")), &format!("pair-{pr}"), pr);
            assert!(tracker.tracked() <= MIN_PRUNE_AT);
        }
        // The most recent fixes are still tracked.
        assert!(tracker.check(&finding("f4999.py"), 5_000).is_some());
    }
}
