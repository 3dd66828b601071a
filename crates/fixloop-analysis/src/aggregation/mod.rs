//! Similarity, greedy clustering and conservative deduplication.

pub mod cluster;
pub mod clusterer;
pub mod dedup;
pub mod pipeline;
pub mod similarity;

pub use cluster::PatternCluster;
pub use clusterer::GreedyClusterer;
pub use dedup::{ClusterDeduplicator, DedupOutcome, NearThresholdWarning};
pub use pipeline::{AggregationDiagnostics, AggregationPipeline, AggregationResult};
pub use similarity::{similarity, SimilarityBreakdown, SimilarityCache};
