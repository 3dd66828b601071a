//! Conservative cluster deduplication.
//!
//! Clusters merge only when their medoid similarity clears the dedup
//! threshold by more than the near-threshold band. Pairs inside the band
//! stay separate and produce a `NearThresholdWarning` for review.
//!
//! Merging is complete-linkage: two groups join only when every cross pair
//! clears the merge bar, so a warned pair never ends up in one group
//! through a third cluster.

use serde::{Deserialize, Serialize};

use fixloop_core::config::ClusteringConfig;
use fixloop_core::errors::ClusteringError;

use super::cluster::PatternCluster;
use super::similarity::SimilarityCache;

/// Action recorded on every near-threshold warning.
pub const ACTION_KEPT_SEPARATE: &str = "kept_separate";

/// A cluster pair too close to the dedup threshold to merge automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearThresholdWarning {
    pub cluster_a_id: String,
    pub cluster_b_id: String,
    pub similarity: f64,
    pub threshold: f64,
    pub action_taken: String,
}

#[derive(Debug)]
pub struct DedupOutcome {
    pub clusters: Vec<PatternCluster>,
    pub warnings: Vec<NearThresholdWarning>,
    /// Number of pairwise merges performed.
    pub merges: usize,
}

/// Disjoint-set over cluster indices.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    /// Returns false when already joined.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        // Smaller index stays root so components keep a stable order.
        if ra < rb {
            self.parent[rb] = ra;
        } else {
            self.parent[ra] = rb;
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct ClusterDeduplicator {
    threshold: f64,
    band: f64,
    cache: SimilarityCache,
}

impl ClusterDeduplicator {
    pub fn new(config: &ClusteringConfig, cache: SimilarityCache) -> Self {
        Self {
            threshold: config.effective_dedup_threshold(),
            band: config.effective_near_threshold_band(),
            cache,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether a medoid similarity is inside the near-threshold band.
    pub fn is_near_threshold(&self, similarity: f64) -> bool {
        (similarity - self.threshold).abs() <= self.band
    }

    /// Whether a medoid similarity merges two clusters.
    pub fn should_merge(&self, similarity: f64) -> bool {
        similarity > self.threshold + self.band
    }

    pub fn dedup(&self, clusters: Vec<PatternCluster>) -> Result<DedupOutcome, ClusteringError> {
        let mut clusters = clusters;
        clusters.sort_by(|a, b| a.cluster_id().cmp(b.cluster_id()));

        let n = clusters.len();
        let mut sims = vec![0.0; n * n];
        let mut warnings = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let sim = self
                    .cache
                    .get_or_compute(clusters[i].centroid_features(), clusters[j].centroid_features())
                    .total();
                sims[i * n + j] = sim;
                sims[j * n + i] = sim;
                if self.is_near_threshold(sim) {
                    tracing::warn!(
                        cluster_a = clusters[i].cluster_id(),
                        cluster_b = clusters[j].cluster_id(),
                        similarity = sim,
                        threshold = self.threshold,
                        "near-threshold cluster pair kept separate"
                    );
                    warnings.push(NearThresholdWarning {
                        cluster_a_id: clusters[i].cluster_id().to_string(),
                        cluster_b_id: clusters[j].cluster_id().to_string(),
                        similarity: sim,
                        threshold: self.threshold,
                        action_taken: ACTION_KEPT_SEPARATE.to_string(),
                    });
                }
            }
        }

        let mut uf = UnionFind::new(n);
        let mut groups: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        let mut merges = 0;
        for i in 0..n {
            for j in (i + 1)..n {
                if !self.should_merge(sims[i * n + j]) {
                    continue;
                }
                let (ri, rj) = (uf.find(i), uf.find(j));
                if ri == rj {
                    continue;
                }
                let linked = groups[ri]
                    .iter()
                    .all(|&a| groups[rj].iter().all(|&b| self.should_merge(sims[a * n + b])));
                if !linked {
                    tracing::debug!(
                        cluster_a = clusters[i].cluster_id(),
                        cluster_b = clusters[j].cluster_id(),
                        "merge refused, groups not fully linked"
                    );
                    continue;
                }
                uf.union(ri, rj);
                let root = uf.find(ri);
                let other = if root == ri { rj } else { ri };
                let moved = std::mem::take(&mut groups[other]);
                groups[root].extend(moved);
                merges += 1;
            }
        }

        let mut components: Vec<Vec<PatternCluster>> = (0..n).map(|_| Vec::new()).collect();
        for (i, cluster) in clusters.into_iter().enumerate() {
            let root = uf.find(i);
            components[root].push(cluster);
        }

        let mut out = Vec::new();
        for component in components.into_iter().filter(|c| !c.is_empty()) {
            let mut iter = component.into_iter();
            if let Some(first) = iter.next() {
                let mut merged = first;
                for next in iter {
                    merged = merged.merge(next, &self.cache)?;
                }
                out.push(merged);
            }
        }
        out.sort_by(|a, b| a.member_ids().cmp(b.member_ids()));

        Ok(DedupOutcome {
            clusters: out,
            warnings,
            merges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::similarity::tests::record;

    fn singleton(cache: &SimilarityCache, id: &str, kw: &[&str], label: &str) -> PatternCluster {
        PatternCluster::from_members(vec![record(id, kw, &["i"], label)], cache).unwrap()
    }

    #[test]
    fn clearly_similar_clusters_merge() {
        let cache = SimilarityCache::new(64);
        let dedup = ClusterDeduplicator::new(&ClusteringConfig::default(), cache.clone());
        let out = dedup
            .dedup(vec![
                singleton(&cache, "a", &["x", "y"], "E1"),
                singleton(&cache, "b", &["x", "y"], "E1"),
            ])
            .unwrap();
        assert_eq!(out.merges, 1);
        assert_eq!(out.clusters.len(), 1);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn near_threshold_pairs_stay_separate_with_warning() {
        let cache = SimilarityCache::new(64);
        let dedup = ClusterDeduplicator::new(&ClusteringConfig::default(), cache.clone());
        // Keyword Jaccard 1/2 gives 0.15 + 0.70 = 0.85, exactly the threshold.
        let out = dedup
            .dedup(vec![
                singleton(&cache, "a", &["x", "y"], "E1"),
                singleton(&cache, "b", &["x"], "E1"),
            ])
            .unwrap();
        assert_eq!(out.merges, 0);
        assert_eq!(out.clusters.len(), 2);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].action_taken, ACTION_KEPT_SEPARATE);
    }

    #[test]
    fn chained_merges_never_join_a_near_threshold_pair() {
        let cache = SimilarityCache::new(64);
        let dedup = ClusterDeduplicator::new(&ClusteringConfig::default(), cache.clone());
        // a-b and b-c score 0.925, a-c scores 0.85.
        let out = dedup
            .dedup(vec![
                singleton(&cache, "a", &["k1", "k2", "k3", "k4", "k5", "k6"], "E1"),
                singleton(&cache, "b", &["k1", "k2", "k3", "k4", "k5", "k6", "k7", "k8"], "E1"),
                singleton(&cache, "c", &["k3", "k4", "k5", "k6", "k7", "k8"], "E1"),
            ])
            .unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.merges, 1);
        assert_eq!(out.clusters.len(), 2);
        for cluster in &out.clusters {
            let ids = cluster.member_ids();
            assert!(
                !(ids.contains(&"a".to_string()) && ids.contains(&"c".to_string())),
                "warned pair merged: {ids:?}"
            );
        }
    }

    #[test]
    fn band_edges() {
        let dedup = ClusterDeduplicator::new(&ClusteringConfig::default(), SimilarityCache::new(4));
        assert!(dedup.is_near_threshold(0.81));
        assert!(!dedup.should_merge(0.89));
        assert!(dedup.should_merge(0.91));
        assert!(!dedup.is_near_threshold(0.91));
    }
}
