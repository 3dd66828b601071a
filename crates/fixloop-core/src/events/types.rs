//! Event payloads delivered to in-process handlers and outbound sinks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FindingFixPair, PatternState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCreatedEvent {
    pub pair: FindingFixPair,
    pub causation_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternPromotedEvent {
    pub pattern_id: String,
    pub signature: String,
    pub domain: String,
    pub version: u32,
    pub from_state: PatternState,
    pub to_state: PatternState,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDemotedEvent {
    pub pattern_id: String,
    pub signature: String,
    pub domain: String,
    pub version: u32,
    pub from_state: PatternState,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodemodValidatedEvent {
    pub codemod_id: String,
    pub pattern_id: String,
    pub rule_id: String,
    pub transform_signature: String,
    pub cases_passed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearThresholdEvent {
    pub cluster_a_id: String,
    pub cluster_b_id: String,
    pub similarity: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRejectedEvent {
    pub event_id: Option<Uuid>,
    pub correlation_id: Option<String>,
    pub error_code: String,
    pub message: String,
}
