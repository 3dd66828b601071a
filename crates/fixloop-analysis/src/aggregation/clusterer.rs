//! Online greedy clustering against cluster medoids.

use fixloop_core::config::ClusteringConfig;
use fixloop_core::errors::ClusteringError;
use fixloop_core::models::FeatureRecord;

use super::cluster::PatternCluster;
use super::similarity::SimilarityCache;

/// Working state of one cluster while records stream in.
struct Group {
    members: Vec<FeatureRecord>,
    distance_sums: Vec<f64>,
    medoid: usize,
}

impl Group {
    fn singleton(record: FeatureRecord) -> Self {
        Self {
            members: vec![record],
            distance_sums: vec![0.0],
            medoid: 0,
        }
    }

    fn medoid(&self) -> &FeatureRecord {
        &self.members[self.medoid]
    }

    /// Add a member and update the medoid incrementally.
    fn push(&mut self, record: FeatureRecord, cache: &SimilarityCache) {
        let mut own = 0.0;
        for (i, member) in self.members.iter().enumerate() {
            let d = 1.0 - cache.get_or_compute(member, &record).total();
            self.distance_sums[i] += d;
            own += d;
        }
        self.members.push(record);
        self.distance_sums.push(own);
        let mut best = 0;
        for (i, v) in self.distance_sums.iter().enumerate().skip(1) {
            if *v < self.distance_sums[best] {
                best = i;
            }
        }
        self.medoid = best;
    }
}

/// Greedy clusterer: each record joins the most similar medoid at or above
/// the join threshold, else starts a singleton. Records are visited in
/// item-id order, so the result does not depend on input order.
#[derive(Debug, Clone)]
pub struct GreedyClusterer {
    join_threshold: f64,
    cache: SimilarityCache,
}

impl GreedyClusterer {
    pub fn new(config: &ClusteringConfig, cache: SimilarityCache) -> Self {
        Self {
            join_threshold: config.effective_join_threshold(),
            cache,
        }
    }

    pub fn cache(&self) -> &SimilarityCache {
        &self.cache
    }

    pub fn cluster(&self, records: &[FeatureRecord]) -> Result<Vec<PatternCluster>, ClusteringError> {
        let mut sorted: Vec<FeatureRecord> = records.to_vec();
        sorted.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        sorted.dedup_by(|a, b| a.item_id == b.item_id);

        let mut groups: Vec<Group> = Vec::new();
        for record in sorted {
            let mut best: Option<(usize, f64)> = None;
            for (i, group) in groups.iter().enumerate() {
                let sim = self.cache.get_or_compute(group.medoid(), &record).total();
                if sim >= self.join_threshold && best.map_or(true, |(_, s)| sim > s) {
                    best = Some((i, sim));
                }
            }
            match best {
                Some((i, _)) => groups[i].push(record, &self.cache),
                None => groups.push(Group::singleton(record)),
            }
        }

        tracing::debug!(
            groups = groups.len(),
            join_threshold = self.join_threshold,
            "greedy clustering complete"
        );
        groups
            .into_iter()
            .map(|g| PatternCluster::from_members(g.members, &self.cache))
            .collect()
    }
}
