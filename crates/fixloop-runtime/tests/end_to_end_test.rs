use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use fixloop_core::config::FixloopConfig;
use fixloop_core::errors::{PublishError, PipelineError};
use fixloop_core::events::{
    EventDispatcher, EventEnvelope, EventRejectedEvent, EventType, FixloopEventHandler,
    PatternPromotedEvent,
};
use fixloop_analysis::pairing::FixOutcome;
use fixloop_analysis::promotion::TransitionReason;
use fixloop_core::models::{
    CodemodStatus, ConfidenceComponents, FindingObserved, FindingResolved, FixApplied,
    LearnedPattern, LineRange, PatternState, Severity,
};
use fixloop_core::traits::{Cancellable, InMemoryChangeIndex, OutboundSink, PatternRepository};
use fixloop_runtime::{FixloopRuntime, RunTrigger};
use fixloop_storage::{SqlitePatternRepository, StorageEngine};

const REPO: &str = "acme/api";
const EVAL_HUNK: &str = "@@ -11,3 +11,3 @@ def load(raw):\n import ast\n-value = eval(raw)\n+value = ast.literal_eval(raw)\n return value\n";

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<EventEnvelope>>,
}

impl RecordingSink {
    fn count(&self, event_type: EventType) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl OutboundSink for RecordingSink {
    fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError> {
        self.sent.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHandler {
    rejected: Mutex<Vec<EventRejectedEvent>>,
    promoted: Mutex<Vec<PatternPromotedEvent>>,
}

impl FixloopEventHandler for RecordingHandler {
    fn on_event_rejected(&self, event: &EventRejectedEvent) {
        self.rejected.lock().unwrap().push(event.clone());
    }

    fn on_pattern_promoted(&self, event: &PatternPromotedEvent) {
        self.promoted.lock().unwrap().push(event.clone());
    }
}

fn base() -> DateTime<Utc> {
    Utc::now() - Duration::hours(3)
}

fn envelope<T: Serialize>(event_type: EventType, payload: &T) -> EventEnvelope {
    EventEnvelope::outbound(event_type, payload, "corr-e2e", None, "ci").unwrap()
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
        observed_at: base(),
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
        applied_at: base() + Duration::minutes(30),
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
        resolved_at: base() + Duration::hours(1),
    }
}

/// Observation, fix and resolution for `count` findings in one PR.
fn lifecycle_batch(count: usize, pr_id: &str, sha: &str) -> Vec<EventEnvelope> {
    let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
    let mut batch = Vec::new();
    for id in &ids {
        batch.push(envelope(EventType::FindingObserved, &observed(*id, pr_id)));
    }
    for id in &ids {
        batch.push(envelope(EventType::FixApplied, &fix(*id, sha)));
    }
    for id in &ids {
        batch.push(envelope(EventType::FindingResolved, &resolved(*id, sha)));
    }
    batch
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

/// A commit that reformats 95 of the PR's 100 files.
fn formatter_index() -> InMemoryChangeIndex {
    let files: Vec<String> = (0..100).map(|i| format!("src/mod_{i:03}.py")).collect();
    let mut batch: Vec<&str> = files[..95].iter().map(String::as_str).collect();
    batch[0] = "app/db.py";
    let rest: Vec<&str> = files[95..].iter().map(String::as_str).collect();
    let mut index = InMemoryChangeIndex::new();
    index.add_commit(REPO, "pr-2", "fmt", &batch);
    index.add_pr_files(REPO, "pr-2", &rest);
    index
}

fn start(
    index: InMemoryChangeIndex,
) -> (FixloopRuntime, Arc<RecordingSink>, Arc<RecordingHandler>) {
    let sink = Arc::new(RecordingSink::default());
    let handler = Arc::new(RecordingHandler::default());
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(handler.clone());
    let engine = Arc::new(StorageEngine::open_in_memory().unwrap());
    let runtime = FixloopRuntime::start(
        &FixloopConfig::default(),
        engine,
        Arc::new(index),
        sink.clone(),
        dispatcher,
    )
    .unwrap();
    (runtime, sink, handler)
}

#[test]
fn repeated_fixes_become_a_validated_pattern_with_a_codemod() {
    let (runtime, sink, handler) = start(focused_index());

    let batch = runtime.submit_batch(lifecycle_batch(5, "pr-1", "c1"));
    assert_eq!(batch.receipts.len(), 15);
    assert_eq!(batch.rejected, 0);
    assert_eq!(batch.pairs_created, 5);
    assert_eq!(batch.pairs_promoted, 5);
    assert_eq!(sink.count(EventType::PairCreated), 5);

    let trigger = RunTrigger::new("corr-run-1");
    let first = runtime.run_promotion(&trigger).unwrap();
    assert!(first.is_clean(), "{:?}", first.errors);
    assert_eq!(first.data.pairs_considered, 5);
    assert_eq!(first.data.patterns_created, 1);
    assert_eq!(first.data.transitions.len(), 1);
    assert_eq!(first.data.transitions[0].from, PatternState::Candidate);
    assert_eq!(first.data.transitions[0].to, PatternState::Provisional);
    assert_eq!(first.data.transitions[0].version, 2);
    assert!(first.data.codemods.is_empty());

    let second = runtime.run_promotion(&RunTrigger::new("corr-run-2")).unwrap();
    assert!(second.is_clean(), "{:?}", second.errors);
    assert_eq!(second.data.patterns_created, 0);
    assert_eq!(second.data.transitions.len(), 1);
    let transition = &second.data.transitions[0];
    assert_eq!(transition.from, PatternState::Provisional);
    assert_eq!(transition.to, PatternState::Validated);
    assert_eq!(transition.version, 3);

    assert_eq!(second.data.codemods.len(), 1);
    let codemod = &second.data.codemods[0];
    assert_eq!(codemod.status, CodemodStatus::Validated);
    assert_eq!(codemod.pattern_id, transition.pattern_id);
    assert_eq!(codemod.cases_failed, 0);
    assert_eq!(codemod.cases_passed, 5);

    assert_eq!(sink.count(EventType::PatternPromoted), 2);
    assert_eq!(sink.count(EventType::CodemodValidated), 1);
    assert_eq!(handler.promoted.lock().unwrap().len(), 2);
}

#[test]
fn promote_pending_waits_for_new_evidence() {
    let (runtime, _sink, _handler) = start(focused_index());
    runtime.submit_batch(lifecycle_batch(3, "pr-1", "c1"));

    let trigger = RunTrigger::new("corr-pending");
    let first = runtime.promote_pending(&trigger).unwrap();
    assert!(!first.data.skipped);
    assert_eq!(first.data.pairs_considered, 3);

    let again = runtime.promote_pending(&trigger).unwrap();
    assert!(again.data.skipped);
    assert_eq!(again.data.pairs_considered, 0);
}

#[test]
fn formatter_batch_fixes_never_become_patterns() {
    let (runtime, sink, _handler) = start(formatter_index());

    let batch = runtime.submit_batch(lifecycle_batch(5, "pr-2", "fmt"));
    assert_eq!(batch.pairs_created, 5);
    assert_eq!(batch.pairs_promoted, 0);
    assert_eq!(sink.count(EventType::PairCreated), 5);

    let report = runtime.run_promotion(&RunTrigger::new("corr-fmt")).unwrap();
    assert_eq!(report.data.pairs_considered, 0);
    assert_eq!(report.data.patterns_created, 0);
    assert!(report.data.transitions.is_empty());

    let pending = runtime.promote_pending(&RunTrigger::new("corr-fmt")).unwrap();
    assert!(pending.data.skipped);
}

#[test]
fn malformed_envelope_is_rejected_with_a_validation_code() {
    let (runtime, sink, handler) = start(focused_index());

    let outcome = runtime.submit_json(r#"{"event_type":"finding-observed.v1"}"#);
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("VALIDATION_ERROR"));

    let mut bad = observed(Uuid::new_v4(), "pr-1");
    bad.line_start = 0;
    let json = envelope(EventType::FindingObserved, &bad).to_json().unwrap();
    let outcome = runtime.submit_json(&json);
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("VALIDATION_ERROR"));
    assert_eq!(outcome.value.map(|b| b.rejected), Some(1));

    let unknown = runtime.submit_json(
        r#"{"event_id":"7b0c6a4e-0000-4000-8000-000000000001","event_type":"finding-vanished.v1","correlation_id":"c","timestamp":"2026-01-01T00:00:00Z","source":"ci","payload":{}}"#,
    );
    assert_eq!(unknown.error_code.as_deref(), Some("UNKNOWN_EVENT_TYPE"));

    assert_eq!(handler.rejected.lock().unwrap().len(), 3);
    assert_eq!(sink.count(EventType::PairCreated), 0);
}

#[test]
fn outbound_events_are_only_pipeline_outputs() {
    let (runtime, _sink, _handler) = start(focused_index());
    let json = envelope(
        EventType::PairCreated,
        &serde_json::json!({ "pair_id": "p" }),
    )
    .to_json()
    .unwrap();
    let outcome = runtime.submit_json(&json);
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.as_deref(), Some("VALIDATION_ERROR"));
}

#[test]
fn cancelled_runtime_refuses_promotion_runs() {
    let (runtime, _sink, _handler) = start(focused_index());
    runtime.submit_batch(lifecycle_batch(3, "pr-1", "c1"));
    runtime.cancellation_token().cancel();

    let err = runtime.run_promotion(&RunTrigger::new("corr-cancel")).unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
    runtime.shutdown();
}

#[test]
fn pairs_and_watermark_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixloop.db");
    let config = FixloopConfig::default();

    let engine = Arc::new(StorageEngine::open(&path, &config.storage).unwrap());
    let runtime = FixloopRuntime::start(
        &config,
        engine,
        Arc::new(focused_index()),
        Arc::new(RecordingSink::default()),
        EventDispatcher::new(),
    )
    .unwrap();
    assert_eq!(runtime.submit_batch(lifecycle_batch(3, "pr-1", "c1")).pairs_created, 3);
    let first = runtime.promote_pending(&RunTrigger::new("corr-before")).unwrap();
    assert_eq!(first.data.pairs_considered, 3);
    runtime.shutdown();

    let engine = Arc::new(StorageEngine::open(&path, &config.storage).unwrap());
    let runtime = FixloopRuntime::start(
        &config,
        engine,
        Arc::new(focused_index()),
        Arc::new(RecordingSink::default()),
        EventDispatcher::new(),
    )
    .unwrap();
    let after = runtime.promote_pending(&RunTrigger::new("corr-after")).unwrap();
    assert!(after.data.skipped);
    let forced = runtime.run_promotion(&RunTrigger::new("corr-after")).unwrap();
    assert_eq!(forced.data.pairs_considered, 3);
    assert_eq!(forced.data.patterns_created, 0);
}

/// The same finding observed again in a later PR.
fn reobserved(pr_id: &str) -> EventEnvelope {
    envelope(EventType::FindingObserved, &observed(Uuid::new_v4(), pr_id))
}

/// A validated lineage whose signature no cluster produces any more.
fn validated_lineage(signature: &str, member_ids: Vec<String>) -> LearnedPattern {
    LearnedPattern {
        pattern_id: LearnedPattern::derive_id(signature, "python", 3),
        signature: signature.into(),
        domain: "python".into(),
        version: 3,
        pattern_type: "PY-EVAL".into(),
        confidence: 0.9,
        components: ConfidenceComponents::default(),
        state: PatternState::Validated,
        is_current: true,
        member_count: member_ids.len() as u32,
        sustained_runs: 2,
        member_ids,
        stored_at: Utc::now(),
        source_run_id: None,
        correlation_id: None,
    }
}

#[test]
fn reintroduced_fix_deprecates_its_validated_pattern() {
    let (runtime, sink, _handler) = start(focused_index());
    runtime.submit_batch(lifecycle_batch(5, "pr-1", "c1"));
    runtime.run_promotion(&RunTrigger::new("corr-1")).unwrap();
    let second = runtime.run_promotion(&RunTrigger::new("corr-2")).unwrap();
    assert_eq!(second.data.transitions[0].to, PatternState::Validated);
    assert_eq!(runtime.rewards().watched(), 1);

    let batch = runtime.submit_batch(vec![reobserved("pr-2")]);
    assert!(batch.receipts[0].reintroduction_of.is_some());

    // No new pair arrived, but the reintroduction is new evidence.
    let third = runtime.promote_pending(&RunTrigger::new("corr-3")).unwrap();
    assert!(!third.data.skipped);
    assert!(third.is_clean(), "{:?}", third.errors);
    assert_eq!(third.data.transitions.len(), 1);
    let demotion = &third.data.transitions[0];
    assert_eq!(demotion.from, PatternState::Validated);
    assert_eq!(demotion.to, PatternState::Deprecated);
    assert_eq!(demotion.reason, TransitionReason::Reintroduction);
    assert_eq!(demotion.version, 4);

    let patterns = SqlitePatternRepository::new(runtime.engine().clone());
    assert!(patterns.list_validated_patterns(None).unwrap().is_empty());
    assert_eq!(sink.count(EventType::PatternDemoted), 1);
    assert_eq!(runtime.rewards().watched(), 0);

    let again = runtime.promote_pending(&RunTrigger::new("corr-4")).unwrap();
    assert!(again.data.skipped);
}

#[test]
fn drifted_lineage_is_deprecated_from_its_stored_members() {
    let (runtime, sink, _handler) = start(focused_index());
    let batch = runtime.submit_batch(lifecycle_batch(5, "pr-1", "c1"));
    let member_ids: Vec<String> = batch.receipts.iter().filter_map(|r| r.pair_id.clone()).collect();
    assert_eq!(member_ids.len(), 5);

    let patterns = SqlitePatternRepository::new(runtime.engine().clone());
    let drifted = validated_lineage("sig-v1:drifted", member_ids);
    assert!(patterns.store_pattern(&drifted).unwrap());

    let batch = runtime.submit_batch(vec![reobserved("pr-3")]);
    assert!(batch.receipts[0].reintroduction_of.is_some());

    let report = runtime.run_promotion(&RunTrigger::new("corr-drift")).unwrap();
    assert!(report.is_clean(), "{:?}", report.errors);
    let demotion = report
        .data
        .transitions
        .iter()
        .find(|t| t.signature == "sig-v1:drifted")
        .expect("drifted lineage evaluated");
    assert_eq!(demotion.from, PatternState::Validated);
    assert_eq!(demotion.to, PatternState::Deprecated);
    assert_eq!(demotion.reason, TransitionReason::Reintroduction);
    assert_eq!(demotion.version, 4);
    // The lineage the pairs cluster into now is new and never demotes.
    assert_eq!(report.data.patterns_created, 1);

    assert!(patterns.list_validated_patterns(None).unwrap().is_empty());
    let latest = patterns
        .get_latest_by_lineage("sig-v1:drifted", "python")
        .unwrap()
        .unwrap();
    assert_eq!(latest.state, PatternState::Deprecated);
    assert_eq!(sink.count(EventType::PatternDemoted), 1);
}

#[test]
fn lineage_without_evidence_in_the_window_still_demotes() {
    let (runtime, _sink, _handler) = start(focused_index());
    let patterns = SqlitePatternRepository::new(runtime.engine().clone());
    assert!(patterns
        .store_pattern(&validated_lineage("sig-v1:aged", vec!["pair-aged".into()]))
        .unwrap());

    let quiet = runtime.promote_pending(&RunTrigger::new("corr-quiet")).unwrap();
    assert!(quiet.data.skipped);

    runtime.record_fix_outcome("pair-aged", FixOutcome::Reintroduced);
    let report = runtime.promote_pending(&RunTrigger::new("corr-aged")).unwrap();
    assert!(!report.data.skipped);
    assert_eq!(report.data.pairs_considered, 0);
    assert_eq!(report.data.transitions.len(), 1);
    assert_eq!(report.data.transitions[0].to, PatternState::Deprecated);
    assert!(patterns.list_validated_patterns(None).unwrap().is_empty());
}
