//! External collaborators the pipeline talks to only through these traits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::PublishError;
use crate::events::EventEnvelope;

/// Report from the static quality scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub quality_score: f64,
    pub dimensions: BTreeMap<String, f64>,
    pub recommendations: Vec<String>,
}

/// Opaque code quality signal producer.
pub trait QualityScorer: Send + Sync {
    fn score_code_quality(&self, content: &str, language: &str) -> QualityReport;
}

/// What to publish on a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRequest {
    pub repo: String,
    pub pr_id: String,
    pub finding_ids: Vec<String>,
    pub body: String,
}

impl PublicationRequest {
    /// Idempotency key: the PR plus the sorted, deduplicated finding set.
    pub fn idempotency_key(&self) -> String {
        let mut ids = self.finding_ids.clone();
        ids.sort();
        ids.dedup();
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.repo.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.pr_id.as_bytes());
        for id in &ids {
            hasher.update(b"\0");
            hasher.update(id.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Code-review host integration (bot PRs and review comments).
pub trait ReviewPublisher: Send + Sync {
    /// Open a bot pull request; returns the host's reference for it.
    fn create_bot_pr(&self, request: &PublicationRequest) -> Result<String, PublishError>;

    fn post_findings(&self, request: &PublicationRequest) -> Result<(), PublishError>;
}

/// Receives outbound envelopes for the message bus.
pub trait OutboundSink: Send + Sync {
    fn publish(&self, envelope: &EventEnvelope) -> Result<(), PublishError>;
}
