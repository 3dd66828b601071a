//! Similarity and clustering configuration.

use serde::{Deserialize, Serialize};

/// Configuration for greedy clustering and cluster deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Minimum similarity to join an existing cluster. Default: 0.70.
    pub join_threshold: Option<f64>,
    /// Inter-cluster similarity a merge must exceed. Default: 0.85.
    pub dedup_threshold: Option<f64>,
    /// Distance from the dedup threshold treated as too close to call. Default: 0.05.
    pub near_threshold_band: Option<f64>,
    /// Entries in the per-run pairwise similarity cache. Default: 10000.
    pub similarity_cache_capacity: Option<u64>,
}

impl ClusteringConfig {
    pub fn effective_join_threshold(&self) -> f64 {
        self.join_threshold.unwrap_or(0.70)
    }

    pub fn effective_dedup_threshold(&self) -> f64 {
        self.dedup_threshold.unwrap_or(0.85)
    }

    pub fn effective_near_threshold_band(&self) -> f64 {
        self.near_threshold_band.unwrap_or(0.05)
    }

    pub fn effective_similarity_cache_capacity(&self) -> u64 {
        self.similarity_cache_capacity.unwrap_or(10_000)
    }
}
