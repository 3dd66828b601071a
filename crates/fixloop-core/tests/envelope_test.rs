use chrono::Utc;
use fixloop_core::errors::{EventError, FixloopErrorCode};
use fixloop_core::events::{EventEnvelope, EventType, InboundEvent};
use fixloop_core::models::{FindingObserved, FixApplied, LineRange, Severity};
use serde_json::json;
use uuid::Uuid;

fn finding(finding_id: Uuid) -> FindingObserved {
    FindingObserved {
        finding_id,
        repo: "acme/api".into(),
        pr_id: "pr-12".into(),
        rule_id: "E1".into(),
        severity: Severity::Error,
        file_path: "app/db.py".into(),
        line_start: 3,
        line_end: None,
        tool_name: "lint".into(),
        tool_version: "1.0".into(),
        normalized_message: "avoid eval".into(),
        raw_message: "avoid `eval`".into(),
        commit_sha_observed: "c0".into(),
        observed_at: Utc::now(),
    }
}

fn envelope(event_type: &str, payload: serde_json::Value) -> String {
    json!({
        "event_id": Uuid::new_v4(),
        "event_type": event_type,
        "correlation_id": "corr-1",
        "timestamp": Utc::now(),
        "source": "review-bot",
        "payload": payload,
    })
    .to_string()
}

#[test]
fn finding_observed_envelope_decodes() {
    let id = Uuid::new_v4();
    let raw = envelope("finding-observed.v1", serde_json::to_value(finding(id)).unwrap());
    let env = EventEnvelope::from_json(&raw).unwrap();
    assert_eq!(env.event_type, EventType::FindingObserved);
    assert!(env.causation_id.is_none());
    match env.decode().unwrap() {
        InboundEvent::FindingObserved(f) => assert_eq!(f.finding_id, id),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_event_type_is_rejected_with_code() {
    let raw = envelope("finding-exploded.v9", json!({}));
    let err = EventEnvelope::from_json(&raw).unwrap_err();
    assert!(matches!(err, EventError::UnknownEventType(_)));
    assert_eq!(err.error_code(), "UNKNOWN_EVENT_TYPE");
}

#[test]
fn inverted_touched_range_is_a_validation_error() {
    let fix = FixApplied {
        fix_id: Uuid::new_v4(),
        finding_id: Uuid::new_v4(),
        fix_commit_sha: "c1".into(),
        file_path: "app/db.py".into(),
        diff_hunks: vec![],
        touched_line_range: LineRange { start: 9, end: 2 },
        tool_autofix: false,
        applied_at: Utc::now(),
        rule_id: None,
    };
    let raw = envelope("fix-applied.v1", serde_json::to_value(fix).unwrap());
    let err = EventEnvelope::from_json(&raw).unwrap().decode().unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert!(err.coded_string().starts_with("[VALIDATION_ERROR]"));
}

#[test]
fn missing_payload_field_is_malformed() {
    let raw = envelope("finding-resolved.v1", json!({ "finding_id": Uuid::new_v4() }));
    let err = EventEnvelope::from_json(&raw).unwrap().decode().unwrap_err();
    assert!(matches!(err, EventError::MalformedPayload { .. }));
}

#[test]
fn outbound_envelope_carries_causation() {
    let cause = Uuid::new_v4();
    let env = EventEnvelope::outbound(
        EventType::PairCreated,
        &json!({ "pair_id": "p" }),
        "corr-9",
        Some(cause),
        "fixloop",
    )
    .unwrap();
    assert_eq!(env.causation_id, Some(cause));
    let back = EventEnvelope::from_json(&env.to_json().unwrap()).unwrap();
    assert_eq!(back.event_type, EventType::PairCreated);
    assert!(back.decode().is_err());
}
