//! Clustering errors.

use super::error_code::{self, FixloopErrorCode};

/// Errors that can occur while building or merging pattern clusters.
#[derive(Debug, thiserror::Error)]
pub enum ClusteringError {
    #[error("Cluster {cluster_id}: {members} members but {indicators} indicator sets")]
    ParallelLengthMismatch {
        cluster_id: String,
        members: usize,
        indicators: usize,
    },

    #[error("Cluster has no members")]
    EmptyCluster,
}

impl FixloopErrorCode for ClusteringError {
    fn error_code(&self) -> &'static str {
        error_code::CLUSTERING_ERROR
    }
}
