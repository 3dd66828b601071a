//! Idempotent wrapper around the code-review host.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use fixloop_core::errors::PublishError;
use fixloop_core::traits::{PublicationLedger, PublicationRequest, ReviewPublisher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublishOutcome {
    /// Sent to the host. Bot PRs carry the host's reference.
    Published(Option<String>),
    /// The same PR and finding set was already published.
    AlreadyPublished,
}

/// Publishes at most once per `(pr, finding set)` and kind.
///
/// The ledger entry is claimed before the host is called and released
/// again when the host fails, so a failed attempt can be retried.
pub struct IdempotentPublisher {
    inner: Arc<dyn ReviewPublisher>,
    ledger: Arc<dyn PublicationLedger>,
}

impl IdempotentPublisher {
    pub fn new(inner: Arc<dyn ReviewPublisher>, ledger: Arc<dyn PublicationLedger>) -> Self {
        Self { inner, ledger }
    }

    pub fn create_bot_pr(&self, request: &PublicationRequest) -> Result<PublishOutcome, PublishError> {
        self.once(request, "bot_pr", |r| self.inner.create_bot_pr(r).map(Some))
    }

    pub fn post_findings(&self, request: &PublicationRequest) -> Result<PublishOutcome, PublishError> {
        self.once(request, "findings", |r| self.inner.post_findings(r).map(|()| None))
    }

    fn once<F>(&self, request: &PublicationRequest, kind: &str, send: F) -> Result<PublishOutcome, PublishError>
    where
        F: FnOnce(&PublicationRequest) -> Result<Option<String>, PublishError>,
    {
        let key = format!("{kind}:{}", request.idempotency_key());
        let claimed = self
            .ledger
            .record_publication(&key, kind)
            .map_err(|e| PublishError::Ledger(e.to_string()))?;
        if !claimed {
            tracing::info!(repo = %request.repo, pr_id = %request.pr_id, kind, "publication already sent");
            return Ok(PublishOutcome::AlreadyPublished);
        }
        match send(request) {
            Ok(reference) => {
                tracing::info!(
                    repo = %request.repo,
                    pr_id = %request.pr_id,
                    kind,
                    findings = request.finding_ids.len(),
                    "publication sent"
                );
                Ok(PublishOutcome::Published(reference))
            }
            Err(e) => {
                if let Err(release) = self.ledger.release_publication(&key) {
                    tracing::error!(error = %release, %key, "publication claim not released");
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for IdempotentPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotentPublisher").finish_non_exhaustive()
    }
}
