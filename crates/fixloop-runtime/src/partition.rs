//! Partition routing: every event of a repo lands on the same worker.

use moka::sync::Cache;
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use fixloop_core::events::InboundEvent;

/// Routes inbound events to worker partitions by `xxh3(repo) % workers`.
///
/// Fix and resolution events carry no repo, so the router remembers the
/// repo of each observed finding. Events of a finding it has not seen are
/// routed by the finding id.
#[derive(Clone)]
pub struct PartitionRouter {
    workers: usize,
    finding_repos: Cache<Uuid, String>,
}

impl PartitionRouter {
    pub fn new(workers: usize, remembered_findings: u64) -> Self {
        Self {
            workers: workers.max(1),
            finding_repos: Cache::builder().max_capacity(remembered_findings).build(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn partition_of_repo(&self, repo: &str) -> usize {
        (xxh3_64(repo.as_bytes()) % self.workers as u64) as usize
    }

    /// Remember the repo of every observation in `events` before any of
    /// them is routed, so a batch may carry a fix ahead of its finding.
    pub fn learn<'a>(&self, events: impl IntoIterator<Item = &'a InboundEvent>) {
        for event in events {
            if let InboundEvent::FindingObserved(observed) = event {
                self.finding_repos
                    .insert(observed.finding_id, observed.repo.clone());
            }
        }
    }

    pub fn route(&self, event: &InboundEvent) -> usize {
        match event {
            InboundEvent::FindingObserved(observed) => {
                self.finding_repos
                    .insert(observed.finding_id, observed.repo.clone());
                self.partition_of_repo(&observed.repo)
            }
            other => {
                let finding_id = other.finding_id();
                match self.finding_repos.get(&finding_id) {
                    Some(repo) => self.partition_of_repo(&repo),
                    None => {
                        tracing::debug!(%finding_id, "routing unknown finding by id");
                        (xxh3_64(finding_id.as_bytes()) % self.workers as u64) as usize
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for PartitionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionRouter")
            .field("workers", &self.workers)
            .field("remembered", &self.finding_repos.entry_count())
            .finish()
    }
}
