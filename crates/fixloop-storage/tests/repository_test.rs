use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use fixloop_core::models::{ConfidenceComponents, LearnedPattern, PatternState};
use fixloop_core::traits::PatternRepository;
use fixloop_storage::{SqlitePatternRepository, StorageEngine};

fn repo() -> SqlitePatternRepository {
    SqlitePatternRepository::new(Arc::new(StorageEngine::open_in_memory().unwrap()))
}

fn pattern(signature: &str, version: u32, state: PatternState, confidence: f64) -> LearnedPattern {
    LearnedPattern {
        pattern_id: LearnedPattern::derive_id(signature, "python", version),
        signature: signature.to_string(),
        domain: "python".into(),
        version,
        pattern_type: "PY-EVAL".into(),
        confidence,
        components: ConfidenceComponents {
            label_agreement: 1.0,
            cluster_cohesion: 0.9,
            frequency_factor: 1.0,
        },
        state,
        is_current: true,
        member_count: 5,
        sustained_runs: 0,
        member_ids: vec!["pair-a".into(), "pair-b".into()],
        stored_at: Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap() + Duration::minutes(version as i64),
        source_run_id: Some("run-1".into()),
        correlation_id: None,
    }
}

fn mixed(repo: &SqlitePatternRepository) {
    let confidences = [0.5, 0.6, 0.7, 0.8];
    for (i, state) in PatternState::ALL.into_iter().enumerate() {
        assert!(repo
            .store_pattern(&pattern(&format!("sig-v1:{i}"), 1, state, confidences[i]))
            .unwrap());
    }
}

#[test]
fn injection_reads_exclude_candidate_and_deprecated() {
    let repo = repo();
    mixed(&repo);

    let by_domain = repo.list_by_domain("python").unwrap();
    let states: Vec<_> = by_domain.iter().map(|p| p.state).collect();
    assert_eq!(states, vec![PatternState::Validated, PatternState::Provisional]);

    let validated = repo.list_validated_patterns(None).unwrap();
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].state, PatternState::Validated);

    let best = repo.get_pattern("PY-EVAL", "python").unwrap().unwrap();
    assert_eq!(best.state, PatternState::Validated);
    assert!(repo.get_pattern("PY-EVAL", "go").unwrap().is_none());
}

#[test]
fn administrative_reads_see_every_state() {
    let repo = repo();
    mixed(&repo);

    let promotion: Vec<_> = repo
        .list_promotion_candidates(Some("python"))
        .unwrap()
        .into_iter()
        .map(|p| p.state)
        .collect();
    assert!(promotion.contains(&PatternState::Candidate));
    assert!(promotion.contains(&PatternState::Provisional));
    assert!(!promotion.contains(&PatternState::Validated));

    let demotion: Vec<_> = repo
        .list_demotion_candidates(None)
        .unwrap()
        .into_iter()
        .map(|p| p.state)
        .collect();
    assert!(demotion.contains(&PatternState::Validated));

    let deprecated = pattern("sig-v1:3", 1, PatternState::Deprecated, 0.8);
    let admin = repo.get_pattern_admin(&deprecated.pattern_id).unwrap().unwrap();
    assert_eq!(admin.state, PatternState::Deprecated);
    assert_eq!(admin, deprecated);
}

#[test]
fn promote_version_flips_the_lineage_atomically() {
    let repo = repo();
    let v1 = pattern("sig-v1:lineage", 1, PatternState::Candidate, 0.7);
    assert!(repo.store_pattern(&v1).unwrap());
    assert!(!repo.store_pattern(&v1).unwrap());

    let v2 = pattern("sig-v1:lineage", 2, PatternState::Provisional, 0.8);
    assert!(repo.promote_version(&v2).unwrap());
    assert!(!repo.promote_version(&v2).unwrap());

    assert_eq!(repo.get_latest_version("sig-v1:lineage", "python").unwrap(), Some(2));
    let old = repo.get_pattern_admin(&v1.pattern_id).unwrap().unwrap();
    assert!(!old.is_current);
    let latest = repo.get_latest_by_lineage("sig-v1:lineage", "python").unwrap().unwrap();
    assert_eq!(latest.pattern_id, v2.pattern_id);
    assert!(latest.is_current);

    let current: Vec<_> = repo
        .list_promotion_candidates(None)
        .unwrap()
        .into_iter()
        .filter(|p| p.signature == "sig-v1:lineage")
        .collect();
    assert_eq!(current.len(), 1);
}

#[test]
fn a_second_current_row_is_refused() {
    let repo = repo();
    assert!(repo
        .store_pattern(&pattern("sig-v1:x", 1, PatternState::Candidate, 0.7))
        .unwrap());
    assert!(!repo
        .store_pattern(&pattern("sig-v1:x", 2, PatternState::Candidate, 0.7))
        .unwrap());
    assert_eq!(repo.set_not_current("sig-v1:x", "python").unwrap(), 1);
    assert_eq!(repo.set_not_current("sig-v1:x", "python").unwrap(), 0);
}

#[test]
fn evaluation_updates_leave_state_and_version() {
    let repo = repo();
    let mut p = pattern("sig-v1:eval", 1, PatternState::Provisional, 0.7);
    assert!(repo.store_pattern(&p).unwrap());

    p.confidence = 0.9;
    p.sustained_runs = 1;
    p.member_ids.push("pair-c".into());
    p.state = PatternState::Validated;
    assert!(repo.record_evaluation(&p).unwrap());

    let stored = repo.get_pattern_admin(&p.pattern_id).unwrap().unwrap();
    assert_eq!(stored.confidence, 0.9);
    assert_eq!(stored.sustained_runs, 1);
    assert_eq!(stored.member_ids.len(), 3);
    assert_eq!(stored.state, PatternState::Provisional);

    let missing = pattern("sig-v1:none", 1, PatternState::Candidate, 0.1);
    assert!(!repo.record_evaluation(&missing).unwrap());
}

#[test]
fn existence_and_stored_at_lookups() {
    let repo = repo();
    let p = pattern("sig-v1:exists", 1, PatternState::Candidate, 0.6);
    assert!(!repo.check_exists("sig-v1:exists", "python").unwrap());
    repo.store_pattern(&p).unwrap();
    assert!(repo.check_exists("sig-v1:exists", "python").unwrap());
    assert!(!repo.check_exists("sig-v1:exists", "go").unwrap());
    assert!(repo.check_exists_by_id(&p.pattern_id).unwrap());
    assert_eq!(repo.get_stored_at(&p.pattern_id).unwrap(), Some(p.stored_at));
    assert_eq!(repo.get_stored_at("pat-missing").unwrap(), None);
}

fn any_state() -> impl Strategy<Value = PatternState> {
    prop::sample::select(PatternState::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn injection_reads_never_leak_ineligible_rows(states in prop::collection::vec(any_state(), 1..12)) {
        let repo = repo();
        for (i, state) in states.iter().enumerate() {
            repo.store_pattern(&pattern(&format!("sig-v1:p{i}"), 1, *state, 0.5)).unwrap();
        }
        let listed = repo.list_by_domain("python").unwrap();
        prop_assert!(listed.iter().all(|p| p.state.is_injectable()));
        let first_provisional = listed.iter().position(|p| p.state == PatternState::Provisional);
        let last_validated = listed.iter().rposition(|p| p.state == PatternState::Validated);
        if let (Some(p), Some(v)) = (first_provisional, last_validated) {
            prop_assert!(v < p);
        }
        let expected = states.iter().filter(|s| s.is_injectable()).count();
        prop_assert_eq!(listed.len(), expected);
        if let Some(best) = repo.get_pattern("PY-EVAL", "python").unwrap() {
            prop_assert!(best.state.is_injectable());
        }
    }
}
