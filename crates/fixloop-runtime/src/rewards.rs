//! Outcome attribution: which fix outcomes count against which pattern.
//!
//! Outcomes are recorded per pair as the workers see them, and per lineage
//! when a validated codemod's anti-pattern shows up again. A promotion run
//! folds both into a `RewardLedger` for each lineage it evaluates.
//!
//! Both outcome maps are bounded `moka` caches that forget keys idle for
//! longer than the evidence window. Watches and lineage outcomes of a
//! deprecated lineage are dropped with `retire`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use moka::sync::Cache;
use rustc_hash::FxHashMap;

use fixloop_analysis::codemod::AntiPatternValidator;
use fixloop_analysis::pairing::{FixOutcome, RewardLedger};
use fixloop_analysis::promotion::LifecycleEvidence;
use fixloop_core::models::{FindingFixPair, PairingType};

const DEFAULT_PAIR_CAPACITY: u64 = 262_144;
const DEFAULT_LINEAGE_CAPACITY: u64 = 16_384;
const DEFAULT_IDLE: Duration = Duration::from_secs(90 * 24 * 60 * 60);
/// Oldest outcomes of a key are dropped past this many.
const MAX_OUTCOMES_PER_KEY: usize = 64;

type Outcomes = Arc<Mutex<Vec<FixOutcome>>>;

/// Ledger key of a pattern lineage.
pub fn lineage_key(signature: &str, domain: &str) -> String {
    format!("{signature}|{domain}")
}

/// Outcome a freshly correlated pair reports for itself.
pub fn pair_outcome(pair: &FindingFixPair) -> FixOutcome {
    match (pair.disappearance_confirmed, pair.pairing_type) {
        (true, PairingType::Autofix) => FixOutcome::AutofixAccepted,
        (true, _) => FixOutcome::ManualFixConfirmed,
        (false, _) => FixOutcome::Unresolved,
    }
}

pub struct RewardAttribution {
    by_pair: Cache<String, Outcomes>,
    by_lineage: Cache<String, Outcomes>,
    watches: RwLock<FxHashMap<String, AntiPatternValidator>>,
    /// Bumped on every negative outcome; lets a pending-only run notice
    /// demotion evidence that arrived without a new pair.
    negative_outcomes: AtomicU64,
}

impl Default for RewardAttribution {
    fn default() -> Self {
        Self::with_limits(DEFAULT_PAIR_CAPACITY, DEFAULT_IDLE)
    }
}

impl RewardAttribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// `pair_capacity` bounds the per-pair map; keys idle for `idle` expire.
    pub fn with_limits(pair_capacity: u64, idle: Duration) -> Self {
        Self {
            by_pair: Cache::builder()
                .max_capacity(pair_capacity)
                .time_to_idle(idle)
                .build(),
            by_lineage: Cache::builder()
                .max_capacity(DEFAULT_LINEAGE_CAPACITY.min(pair_capacity.max(1)))
                .time_to_idle(idle)
                .build(),
            watches: RwLock::new(FxHashMap::default()),
            negative_outcomes: AtomicU64::new(0),
        }
    }

    pub fn record_pair(&self, pair_id: &str, outcome: FixOutcome) {
        self.record(&self.by_pair, pair_id, outcome);
    }

    pub fn record_lineage(&self, key: &str, outcome: FixOutcome) {
        self.record(&self.by_lineage, key, outcome);
    }

    fn record(&self, cache: &Cache<String, Outcomes>, key: &str, outcome: FixOutcome) {
        let slot = cache.get_with(key.to_string(), || Arc::new(Mutex::new(Vec::new())));
        if let Ok(mut outcomes) = slot.lock() {
            outcomes.push(outcome);
            if outcomes.len() > MAX_OUTCOMES_PER_KEY {
                let excess = outcomes.len() - MAX_OUTCOMES_PER_KEY;
                outcomes.drain(..excess);
            }
        }
        if outcome.reward() < 0.0 {
            self.negative_outcomes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn outcomes(cache: &Cache<String, Outcomes>, key: &str) -> Vec<FixOutcome> {
        cache
            .get(key)
            .and_then(|slot| slot.lock().ok().map(|outcomes| outcomes.clone()))
            .unwrap_or_default()
    }

    /// Outcomes recorded for one pair, in arrival order.
    pub fn pair_outcomes(&self, pair_id: &str) -> Vec<FixOutcome> {
        Self::outcomes(&self.by_pair, pair_id)
    }

    /// Count of negative outcomes recorded so far.
    pub fn negative_outcomes(&self) -> u64 {
        self.negative_outcomes.load(Ordering::Relaxed)
    }

    /// Demotion evidence for a lineage: member outcomes in pair-id order,
    /// then the outcomes recorded against the lineage itself.
    pub fn evidence(&self, key: &str, member_ids: &[String], alpha: f64) -> LifecycleEvidence {
        let mut ledger = RewardLedger::new(alpha);
        let mut reintroduced = false;
        let mut members: Vec<&String> = member_ids.iter().collect();
        members.sort();
        members.dedup();
        for id in members {
            for outcome in Self::outcomes(&self.by_pair, id) {
                reintroduced |= outcome == FixOutcome::Reintroduced;
                ledger.record(key, outcome);
            }
        }
        for outcome in Self::outcomes(&self.by_lineage, key) {
            ledger.record(key, outcome);
        }
        LifecycleEvidence {
            reintroduced,
            reward: ledger.stats(key),
        }
    }

    /// Watch later diffs for the anti-pattern of a validated codemod.
    pub fn watch(&self, key: &str, validator: AntiPatternValidator) {
        if let Ok(mut watches) = self.watches.write() {
            watches.insert(key.to_string(), validator);
        }
    }

    /// Forget the watch and lineage outcomes of a deprecated lineage.
    pub fn retire(&self, key: &str) {
        self.by_lineage.invalidate(key);
        if let Ok(mut watches) = self.watches.write() {
            watches.remove(key);
        }
    }

    pub fn watched(&self) -> usize {
        self.watches.read().map(|w| w.len()).unwrap_or(0)
    }

    /// Pair keys currently held, after pending evictions ran.
    pub fn tracked_pairs(&self) -> u64 {
        self.by_pair.run_pending_tasks();
        self.by_pair.entry_count()
    }

    /// Record a repeated violation for every watched lineage whose
    /// anti-pattern the pair's added lines bring back. Returns the keys hit.
    pub fn check_violations(&self, pair: &FindingFixPair) -> Vec<String> {
        let mut hits: Vec<String> = match self.watches.read() {
            Ok(watches) => watches
                .iter()
                .filter(|(_, v)| !v.detect_reintroduction(&pair.diff_hunks).is_empty())
                .map(|(k, _)| k.clone())
                .collect(),
            Err(_) => Vec::new(),
        };
        hits.sort();
        for key in &hits {
            tracing::warn!(pair_id = %pair.pair_id, lineage = %key, "fix reintroduces a learned anti-pattern");
            self.record_lineage(key, FixOutcome::RepeatedViolation);
        }
        hits
    }
}

impl fmt::Debug for RewardAttribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardAttribution")
            .field("pairs", &self.by_pair.entry_count())
            .field("lineages", &self.by_lineage.entry_count())
            .field("watched", &self.watched())
            .field("negative_outcomes", &self.negative_outcomes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn pair(id: &str, confirmed: bool, pairing_type: PairingType, hunk: &str) -> FindingFixPair {
        FindingFixPair {
            pair_id: id.into(),
            finding_id: Uuid::new_v4(),
            fix_commit_sha: "c1".into(),
            diff_hunks: vec![hunk.into()],
            confidence_score: 1.0,
            disappearance_confirmed: confirmed,
            pairing_type,
            created_at: Utc::now(),
            repo: "acme/api".into(),
            rule_id: "PY-EVAL".into(),
            file_path: "app/db.py".into(),
            promoted: true,
        }
    }

    #[test]
    fn pair_outcome_follows_confirmation_and_pairing() {
        let hunk = "@@ -1 +1 @@\n-a\n+b\n";
        assert_eq!(
            pair_outcome(&pair("p", true, PairingType::Autofix, hunk)),
            FixOutcome::AutofixAccepted
        );
        assert_eq!(
            pair_outcome(&pair("p", true, PairingType::SamePr, hunk)),
            FixOutcome::ManualFixConfirmed
        );
        assert_eq!(
            pair_outcome(&pair("p", false, PairingType::Autofix, hunk)),
            FixOutcome::Unresolved
        );
    }

    #[test]
    fn reintroduced_member_marks_the_lineage() {
        let rewards = RewardAttribution::new();
        rewards.record_pair("p1", FixOutcome::ManualFixConfirmed);
        rewards.record_pair("p2", FixOutcome::ManualFixConfirmed);
        rewards.record_pair("p2", FixOutcome::Reintroduced);
        rewards.record_pair("other", FixOutcome::Reintroduced);

        let members = vec!["p1".to_string(), "p2".to_string()];
        let evidence = rewards.evidence("sig|python", &members, 0.3);
        assert!(evidence.reintroduced);
        assert_eq!(evidence.reward.observations, 3);
        assert_eq!(evidence.reward.reintroductions, 1);

        let clean = rewards.evidence("sig|python", &["p1".to_string()], 0.3);
        assert!(!clean.reintroduced);
        assert_eq!(clean.reward.observations, 1);
    }

    #[test]
    fn watched_anti_pattern_counts_repeated_violations() {
        let rewards = RewardAttribution::new();
        let validator =
            AntiPatternValidator::with_matchers("tx-v1:abc", vec!["value = eval(raw)".into()]);
        rewards.watch("sig|python", validator);

        let regress = pair(
            "p9",
            true,
            PairingType::SameCommit,
            "@@ -3,1 +3,1 @@\n-value = parse(raw)\n+value = eval(raw)\n",
        );
        assert_eq!(rewards.check_violations(&regress), vec!["sig|python".to_string()]);
        let fine = pair(
            "p10",
            true,
            PairingType::SameCommit,
            "@@ -3,1 +3,1 @@\n-value = eval(raw)\n+value = parse(raw)\n",
        );
        assert!(rewards.check_violations(&fine).is_empty());

        let evidence = rewards.evidence("sig|python", &[], 0.3);
        assert_eq!(evidence.reward.violations, 1);
        assert!(!evidence.reintroduced);

        rewards.retire("sig|python");
        assert_eq!(rewards.watched(), 0);
        assert!(rewards.check_violations(&regress).is_empty());
        assert_eq!(rewards.evidence("sig|python", &[], 0.3).reward.observations, 0);
    }

    #[test]
    fn pair_outcomes_are_bounded() {
        let rewards = RewardAttribution::with_limits(8, std::time::Duration::from_secs(3600));
        for i in 0..20 {
            rewards.record_pair(&format!("p{i}"), FixOutcome::ManualFixConfirmed);
        }
        assert!(rewards.tracked_pairs() <= 8);

        let rewards = RewardAttribution::new();
        for _ in 0..200 {
            rewards.record_pair("busy", FixOutcome::Unresolved);
        }
        assert_eq!(rewards.pair_outcomes("busy").len(), MAX_OUTCOMES_PER_KEY);
    }

    #[test]
    fn negative_outcomes_are_counted() {
        let rewards = RewardAttribution::new();
        rewards.record_pair("p1", FixOutcome::ManualFixConfirmed);
        assert_eq!(rewards.negative_outcomes(), 0);
        rewards.record_pair("p1", FixOutcome::Reintroduced);
        assert_eq!(rewards.negative_outcomes(), 1);
    }
}
