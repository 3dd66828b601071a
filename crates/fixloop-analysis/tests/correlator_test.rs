use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use fixloop_analysis::pairing::{EventCorrelator, PairingMetrics};
use fixloop_core::config::FixloopConfig;
use fixloop_core::events::InboundEvent;
use fixloop_core::models::{
    FindingObserved, FindingResolved, FixApplied, LineRange, PairingType, Severity,
};
use fixloop_core::traits::InMemoryChangeIndex;

const REPO: &str = "acme/api";
const EVAL_HUNK: &str = "@@ -11,3 +11,3 @@ def load(raw):\n import ast\n-value = eval(raw)\n+value = ast.literal_eval(raw)\n return value\n";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn observed(finding_id: Uuid, pr_id: &str) -> FindingObserved {
    FindingObserved {
        finding_id,
        repo: REPO.into(),
        pr_id: pr_id.into(),
        rule_id: "PY-EVAL".into(),
        severity: Severity::Warning,
        file_path: "app/db.py".into(),
        line_start: 12,
        line_end: None,
        tool_name: "pylint".into(),
        tool_version: "3.1".into(),
        normalized_message: "use of eval is unsafe".into(),
        raw_message: "use of `eval` is unsafe".into(),
        commit_sha_observed: "c0".into(),
        observed_at: t0(),
    }
}

fn fix(finding_id: Uuid, sha: &str) -> FixApplied {
    FixApplied {
        fix_id: Uuid::new_v4(),
        finding_id,
        fix_commit_sha: sha.into(),
        file_path: "app/db.py".into(),
        diff_hunks: vec![EVAL_HUNK.to_string()],
        touched_line_range: LineRange { start: 11, end: 13 },
        tool_autofix: false,
        applied_at: t0() + Duration::hours(1),
        rule_id: Some("PY-EVAL".into()),
    }
}

fn resolved(finding_id: Uuid, sha: &str) -> FindingResolved {
    FindingResolved {
        resolution_id: Uuid::new_v4(),
        finding_id,
        fix_commit_sha: sha.into(),
        verified_at_commit_sha: format!("{sha}-ci"),
        ci_run_id: "ci-77".into(),
        resolved_at: t0() + Duration::hours(2),
    }
}

/// A ten-file PR whose fix commit touches one file.
fn focused_index() -> InMemoryChangeIndex {
    let mut index = InMemoryChangeIndex::new();
    index.add_commit(REPO, "pr-1", "c1", &["app/db.py"]);
    index.add_pr_files(
        REPO,
        "pr-1",
        &[
            "app/api.py",
            "app/models.py",
            "app/views.py",
            "app/auth.py",
            "app/cache.py",
            "app/queue.py",
            "app/util.py",
            "tests/test_db.py",
            "README.md",
        ],
    );
    index
}

fn correlator(index: InMemoryChangeIndex) -> EventCorrelator {
    EventCorrelator::new(&FixloopConfig::default(), Arc::new(index))
}

#[test]
fn full_evidence_pair_scores_one_and_promotes() {
    let mut correlator = correlator(focused_index());
    let id = Uuid::new_v4();

    assert!(correlator
        .ingest(InboundEvent::FindingObserved(observed(id, "pr-1")))
        .pair
        .is_none());
    assert!(correlator
        .ingest(InboundEvent::FixApplied(fix(id, "c1")))
        .pair
        .is_none());
    let scored = correlator
        .ingest(InboundEvent::FindingResolved(resolved(id, "c1")))
        .pair
        .expect("pair once all three events arrived");

    assert_eq!(scored.score.confidence_score, 1.0);
    assert!(scored.score.promoted);
    assert!(!scored.score.is_formatter_batch);
    assert_eq!(scored.pair.pairing_type, PairingType::SameCommit);
    assert!(scored.pair.disappearance_confirmed);
    assert_eq!(scored.offending_token.as_deref(), Some("eval"));
    assert!(scored.context.anchored_to_hunk);
    assert!(scored.context.diff_removes_token);
    assert_eq!(scored.pair.created_at, t0() + Duration::hours(2));
}

#[test]
fn arrival_order_does_not_change_the_pair() {
    let id = Uuid::new_v4();
    let fix_event = fix(id, "c1");

    let mut forward = correlator(focused_index());
    forward.ingest(InboundEvent::FindingObserved(observed(id, "pr-1")));
    forward.ingest(InboundEvent::FixApplied(fix_event.clone()));
    let a = forward
        .ingest(InboundEvent::FindingResolved(resolved(id, "c1")))
        .pair
        .unwrap();

    let mut backward = correlator(focused_index());
    backward.ingest(InboundEvent::FindingResolved(resolved(id, "c1")));
    backward.ingest(InboundEvent::FixApplied(fix_event));
    let b = backward
        .ingest(InboundEvent::FindingObserved(observed(id, "pr-1")))
        .pair
        .unwrap();

    assert_eq!(a.pair.pair_id, b.pair.pair_id);
    assert_eq!(a.score, b.score);
}

#[test]
fn redelivered_events_emit_nothing_new() {
    let mut correlator = correlator(focused_index());
    let id = Uuid::new_v4();
    let resolution = resolved(id, "c1");
    correlator.ingest(InboundEvent::FindingObserved(observed(id, "pr-1")));
    correlator.ingest(InboundEvent::FixApplied(fix(id, "c1")));
    assert!(correlator
        .ingest(InboundEvent::FindingResolved(resolution.clone()))
        .pair
        .is_some());

    assert!(correlator
        .ingest(InboundEvent::FindingResolved(resolution))
        .pair
        .is_none());
    assert!(correlator
        .ingest(InboundEvent::FindingObserved(observed(id, "pr-1")))
        .pair
        .is_none());
    assert_eq!(correlator.observed_count(), 1);
}

#[test]
fn formatter_batch_commit_is_scored_but_not_promoted() {
    let files: Vec<String> = (0..100).map(|i| format!("src/mod_{i:03}.py")).collect();
    let mut batch: Vec<&str> = files[..95].iter().map(String::as_str).collect();
    batch[0] = "app/db.py";
    let rest: Vec<&str> = files[95..].iter().map(String::as_str).collect();

    let mut index = InMemoryChangeIndex::new();
    index.add_commit(REPO, "pr-2", "fmt", &batch);
    index.add_pr_files(REPO, "pr-2", &rest);

    let mut correlator = correlator(index);
    let id = Uuid::new_v4();
    correlator.ingest(InboundEvent::FindingObserved(observed(id, "pr-2")));
    correlator.ingest(InboundEvent::FixApplied(fix(id, "fmt")));
    let scored = correlator
        .ingest(InboundEvent::FindingResolved(resolved(id, "fmt")))
        .pair
        .unwrap();

    assert_eq!(scored.score.confidence_score, 1.0);
    assert!(scored.score.is_formatter_batch);
    assert!(!scored.score.promoted);
    assert!(!scored.pair.promoted);
}

#[test]
fn config_file_in_fix_commit_costs_a_tenth() {
    let mut index = InMemoryChangeIndex::new();
    index.add_commit(REPO, "pr-4", "c4", &["app/db.py", "setup.cfg"]);
    index.add_pr_files(
        REPO,
        "pr-4",
        &["app/a.py", "app/b.py", "app/c.py", "app/d.py", "app/e.py"],
    );
    let mut correlator = correlator(index);
    let id = Uuid::new_v4();
    correlator.ingest(InboundEvent::FindingObserved(observed(id, "pr-4")));
    correlator.ingest(InboundEvent::FixApplied(fix(id, "c4")));
    let scored = correlator
        .ingest(InboundEvent::FindingResolved(resolved(id, "c4")))
        .pair
        .unwrap();

    assert!(scored.context.config_change_detected);
    assert_eq!(scored.score.confidence_score, 0.9);
    assert!(scored.score.promoted);
}

#[test]
fn resolution_naming_an_unknown_commit_is_ambiguous() {
    let mut correlator = correlator(focused_index());
    let id = Uuid::new_v4();
    correlator.ingest(InboundEvent::FindingObserved(observed(id, "pr-1")));
    correlator.ingest(InboundEvent::FixApplied(fix(id, "c1")));
    let scored = correlator
        .ingest(InboundEvent::FindingResolved(resolved(id, "c-other")))
        .pair
        .unwrap();

    assert!(scored.context.ambiguous_commits);
    assert_eq!(scored.pair.pairing_type, PairingType::SamePr);
    // 1.0 - 0.2 for ambiguity; resolution still follows the fix in time.
    assert_eq!(scored.score.confidence_score, 0.8);
}

#[test]
fn fixed_finding_reappearing_in_a_later_pr_is_reintroduced() {
    let mut correlator = correlator(focused_index());
    let id = Uuid::new_v4();
    correlator.ingest(InboundEvent::FindingObserved(observed(id, "pr-1")));
    correlator.ingest(InboundEvent::FixApplied(fix(id, "c1")));
    let original = correlator
        .ingest(InboundEvent::FindingResolved(resolved(id, "c1")))
        .pair
        .unwrap();

    let again = Uuid::new_v4();
    let signal = correlator
        .ingest(InboundEvent::FindingObserved(observed(again, "pr-3")))
        .reintroduction
        .expect("same fingerprint within the PR window");
    assert_eq!(signal.original_pair_id, original.pair.pair_id);
    assert_eq!(signal.original_pr_ordinal, 1);
    assert_eq!(signal.pr_id, "pr-3");

    // Signalled once per fix.
    let third = Uuid::new_v4();
    assert!(correlator
        .ingest(InboundEvent::FindingObserved(observed(third, "pr-4")))
        .reintroduction
        .is_none());
}

#[test]
fn reappearance_beyond_the_window_is_not_a_reintroduction() {
    let mut correlator = correlator(focused_index());
    let id = Uuid::new_v4();
    correlator.ingest(InboundEvent::FindingObserved(observed(id, "pr-1")));
    correlator.ingest(InboundEvent::FixApplied(fix(id, "c1")));
    correlator.ingest(InboundEvent::FindingResolved(resolved(id, "c1")));

    let late = Uuid::new_v4();
    assert!(correlator
        .ingest(InboundEvent::FindingObserved(observed(late, "pr-9")))
        .reintroduction
        .is_none());
}

#[test]
fn metrics_and_eviction_follow_emitted_pairs() {
    let mut correlator = correlator(focused_index());
    let mut pairs = Vec::new();
    for _ in 0..3 {
        let id = Uuid::new_v4();
        correlator.ingest(InboundEvent::FindingObserved(observed(id, "pr-1")));
        correlator.ingest(InboundEvent::FixApplied(fix(id, "c1")));
        if let Some(scored) = correlator
            .ingest(InboundEvent::FindingResolved(resolved(id, "c1")))
            .pair
        {
            pairs.push(scored.pair);
        }
    }
    let pending = Uuid::new_v4();
    correlator.ingest(InboundEvent::FindingObserved(observed(pending, "pr-1")));

    let metrics = PairingMetrics::compute(correlator.observed_count(), &pairs, 0);
    assert_eq!(metrics.observed_findings, 4);
    assert_eq!(metrics.pairs, 3);
    assert_eq!(metrics.paired_rate, 0.75);
    assert_eq!(metrics.promoted_rate, 1.0);

    assert_eq!(correlator.evict_emitted(), 3);
    assert_eq!(correlator.tracked_findings(), 1);
}
