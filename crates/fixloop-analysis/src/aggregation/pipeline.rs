//! Aggregation run: greedy clustering, then conservative dedup.

use std::fmt;

use fixloop_core::config::ClusteringConfig;
use fixloop_core::errors::PipelineError;
use fixloop_core::models::FeatureRecord;
use fixloop_core::traits::{Cancellable, CancellationToken};

use super::cluster::PatternCluster;
use super::clusterer::GreedyClusterer;
use super::dedup::{ClusterDeduplicator, NearThresholdWarning};
use super::similarity::SimilarityCache;

/// One aggregation run. Holds its own similarity cache, so concurrent runs
/// over disjoint batches share no state.
pub struct AggregationPipeline {
    clusterer: GreedyClusterer,
    deduplicator: ClusterDeduplicator,
    cache: SimilarityCache,
}

impl AggregationPipeline {
    pub fn new(config: &ClusteringConfig) -> Self {
        let cache = SimilarityCache::new(config.effective_similarity_cache_capacity());
        Self::with_cache(config, cache)
    }

    /// Use an injected cache (shared between the clusterer and deduplicator).
    pub fn with_cache(config: &ClusteringConfig, cache: SimilarityCache) -> Self {
        Self {
            clusterer: GreedyClusterer::new(config, cache.clone()),
            deduplicator: ClusterDeduplicator::new(config, cache.clone()),
            cache,
        }
    }

    pub fn run(
        &self,
        records: &[FeatureRecord],
        cancel: &CancellationToken,
    ) -> Result<AggregationResult, PipelineError> {
        let clustered = self.clusterer.cluster(records)?;
        let pre_dedup = clustered.len();
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let outcome = self.deduplicator.dedup(clustered)?;
        let diagnostics = AggregationDiagnostics::compute(
            records.len(),
            pre_dedup,
            &outcome.clusters,
            outcome.merges,
            outcome.warnings.len(),
            self.cache.hit_rate(),
        );
        tracing::info!(%diagnostics, "aggregation complete");
        Ok(AggregationResult {
            clusters: outcome.clusters,
            warnings: outcome.warnings,
            diagnostics,
        })
    }

    /// Run without a cancellation source.
    pub fn run_to_completion(&self, records: &[FeatureRecord]) -> Result<AggregationResult, PipelineError> {
        self.run(records, &CancellationToken::new())
    }
}

#[derive(Debug)]
pub struct AggregationResult {
    pub clusters: Vec<PatternCluster>,
    pub warnings: Vec<NearThresholdWarning>,
    pub diagnostics: AggregationDiagnostics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationDiagnostics {
    pub input_records: usize,
    pub clusters_before_dedup: usize,
    pub clusters_after_dedup: usize,
    pub merges: usize,
    pub near_threshold_warnings: usize,
    pub singleton_clusters: usize,
    /// Mean internal similarity over non-singleton clusters.
    pub mean_cohesion: f64,
    pub cache_hit_rate: f64,
}

impl AggregationDiagnostics {
    fn compute(
        input_records: usize,
        clusters_before_dedup: usize,
        clusters: &[PatternCluster],
        merges: usize,
        near_threshold_warnings: usize,
        cache_hit_rate: f64,
    ) -> Self {
        let multi: Vec<f64> = clusters
            .iter()
            .filter(|c| c.member_count() > 1)
            .map(PatternCluster::internal_similarity)
            .collect();
        let mean_cohesion = if multi.is_empty() {
            0.0
        } else {
            multi.iter().sum::<f64>() / multi.len() as f64
        };
        Self {
            input_records,
            clusters_before_dedup,
            clusters_after_dedup: clusters.len(),
            merges,
            near_threshold_warnings,
            singleton_clusters: clusters.len() - multi.len(),
            mean_cohesion,
            cache_hit_rate,
        }
    }
}

impl fmt::Display for AggregationDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AggregationDiagnostics {{ records={}, clusters={}->{}, merges={}, near_threshold={}, singletons={}, cohesion={:.3}, cache_hit_rate={:.3} }}",
            self.input_records,
            self.clusters_before_dedup,
            self.clusters_after_dedup,
            self.merges,
            self.near_threshold_warnings,
            self.singleton_clusters,
            self.mean_cohesion,
            self.cache_hit_rate,
        )
    }
}
