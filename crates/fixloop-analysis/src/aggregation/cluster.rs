//! Pattern clusters: member sets with a medoid and cohesion statistics.

use std::collections::BTreeMap;

use fixloop_core::errors::ClusteringError;
use fixloop_core::models::FeatureRecord;

use super::similarity::SimilarityCache;

/// Pattern type of members without any label.
pub const UNLABELED: &str = "unlabeled";

/// A group of similar feature records.
///
/// Members are sorted by item id and deduplicated. `member_pattern_indicators`
/// is parallel to `member_ids`; construction fails when the lengths differ.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCluster {
    cluster_id: String,
    pattern_type: String,
    member_ids: Vec<String>,
    member_pattern_indicators: Vec<Vec<String>>,
    members: Vec<FeatureRecord>,
    medoid: usize,
    internal_similarity: f64,
    label_agreement: f64,
}

impl PatternCluster {
    /// Build a cluster from its member records, computing the medoid,
    /// cohesion and label agreement.
    pub fn from_members(
        members: Vec<FeatureRecord>,
        cache: &SimilarityCache,
    ) -> Result<Self, ClusteringError> {
        let mut members = members;
        members.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        members.dedup_by(|a, b| a.item_id == b.item_id);
        if members.is_empty() {
            return Err(ClusteringError::EmptyCluster);
        }

        let n = members.len();
        let mut distance_sums = vec![0.0f64; n];
        let mut similarity_sum = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let sim = cache.get_or_compute(&members[i], &members[j]).total();
                similarity_sum += sim;
                distance_sums[i] += 1.0 - sim;
                distance_sums[j] += 1.0 - sim;
            }
        }
        let medoid = argmin(&distance_sums);
        let internal_similarity = if n == 1 {
            1.0
        } else {
            similarity_sum / (n * (n - 1) / 2) as f64
        };
        let (pattern_type, label_agreement) = majority_label(&members);

        let member_ids: Vec<String> = members.iter().map(|m| m.item_id.clone()).collect();
        let indicators: Vec<Vec<String>> = members
            .iter()
            .map(|m| m.pattern_indicators.clone())
            .collect();
        let cluster_id = derive_cluster_id(&member_ids);
        check_parallel(&cluster_id, &member_ids, &indicators)?;

        Ok(Self {
            cluster_id,
            pattern_type,
            member_ids,
            member_pattern_indicators: indicators,
            members,
            medoid,
            internal_similarity,
            label_agreement,
        })
    }

    /// Union of two clusters, recomputing every derived field.
    pub fn merge(self, other: PatternCluster, cache: &SimilarityCache) -> Result<Self, ClusteringError> {
        let mut members = self.members;
        members.extend(other.members);
        Self::from_members(members, cache)
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Majority primary label of the members.
    pub fn pattern_type(&self) -> &str {
        &self.pattern_type
    }

    pub fn member_ids(&self) -> &[String] {
        &self.member_ids
    }

    pub fn member_pattern_indicators(&self) -> &[Vec<String>] {
        &self.member_pattern_indicators
    }

    pub fn members(&self) -> &[FeatureRecord] {
        &self.members
    }

    /// The medoid member (never a synthetic average).
    pub fn centroid_features(&self) -> &FeatureRecord {
        &self.members[self.medoid]
    }

    pub fn member_count(&self) -> u32 {
        self.member_ids.len() as u32
    }

    /// Mean pairwise similarity; 1.0 for a singleton.
    pub fn internal_similarity(&self) -> f64 {
        self.internal_similarity
    }

    /// Fraction of members whose primary label is the majority label.
    pub fn label_agreement(&self) -> f64 {
        self.label_agreement
    }

    pub fn domain(&self) -> &str {
        &self.centroid_features().domain
    }

    /// Keywords present on at least half of the members, sorted.
    pub fn consensus_keywords(&self) -> Vec<String> {
        consensus(self.members.iter().map(|m| m.keywords.as_slice()), self.members.len())
    }

    /// Indicators present on at least half of the members, sorted.
    pub fn consensus_indicators(&self) -> Vec<String> {
        consensus(
            self.member_pattern_indicators.iter().map(Vec::as_slice),
            self.member_ids.len(),
        )
    }
}

fn consensus<'a>(sets: impl Iterator<Item = &'a [String]>, n: usize) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for set in sets {
        let mut seen: Vec<&str> = set.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for item in seen {
            *counts.entry(item).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, c)| c * 2 >= n)
        .map(|(item, _)| item.to_string())
        .collect()
}

/// Reject a member list and indicator list of different lengths.
pub fn check_parallel(
    cluster_id: &str,
    member_ids: &[String],
    indicators: &[Vec<String>],
) -> Result<(), ClusteringError> {
    if member_ids.len() != indicators.len() {
        return Err(ClusteringError::ParallelLengthMismatch {
            cluster_id: cluster_id.to_string(),
            members: member_ids.len(),
            indicators: indicators.len(),
        });
    }
    Ok(())
}

/// Deterministic id from the sorted member ids.
pub fn derive_cluster_id(member_ids: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for id in member_ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
    }
    format!("clu-{}", &hasher.finalize().to_hex()[..16])
}

/// Index of the smallest value; the first wins ties.
fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v < values[best] {
            best = i;
        }
    }
    best
}

fn majority_label(members: &[FeatureRecord]) -> (String, f64) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for m in members {
        *counts.entry(m.primary_label().unwrap_or(UNLABELED)).or_default() += 1;
    }
    // BTreeMap iteration is ordered, so the smallest label wins ties.
    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((label, count));
        }
    }
    match best {
        Some((label, count)) => (label.to_string(), count as f64 / members.len() as f64),
        None => (UNLABELED.to_string(), 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::similarity::tests::record;

    #[test]
    fn members_are_sorted_and_deduplicated() {
        let cache = SimilarityCache::new(64);
        let a = record("b", &["x"], &["i1"], "E1");
        let b = record("a", &["x"], &["i1"], "E1");
        let cluster = PatternCluster::from_members(vec![a.clone(), b, a], &cache).unwrap();
        assert_eq!(cluster.member_ids(), &["a".to_string(), "b".to_string()]);
        assert_eq!(cluster.member_pattern_indicators().len(), 2);
        assert_eq!(cluster.internal_similarity(), 1.0);
        assert_eq!(cluster.centroid_features().item_id, "a");
    }

    #[test]
    fn label_agreement_is_majority_fraction() {
        let cache = SimilarityCache::new(64);
        let cluster = PatternCluster::from_members(
            vec![
                record("a", &["x"], &[], "E1"),
                record("b", &["x"], &[], "E1"),
                record("c", &["x"], &[], "E1"),
                record("d", &["x"], &[], "E2"),
            ],
            &cache,
        )
        .unwrap();
        assert_eq!(cluster.pattern_type(), "E1");
        assert!((cluster.label_agreement() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn medoid_minimises_distance() {
        let cache = SimilarityCache::new(64);
        let cluster = PatternCluster::from_members(
            vec![
                record("a", &["p", "q"], &[], "E1"),
                record("b", &["p", "q", "r"], &[], "E1"),
                record("c", &["q", "r", "s"], &[], "E1"),
            ],
            &cache,
        )
        .unwrap();
        assert_eq!(cluster.centroid_features().item_id, "b");
    }

    #[test]
    fn parallel_length_mismatch_is_rejected() {
        let err = check_parallel("clu-1", &["a".into(), "b".into()], &[vec![]]).unwrap_err();
        assert!(matches!(err, ClusteringError::ParallelLengthMismatch { members: 2, indicators: 1, .. }));
    }

    #[test]
    fn consensus_needs_half_the_members() {
        let cache = SimilarityCache::new(64);
        let cluster = PatternCluster::from_members(
            vec![
                record("a", &["eval", "x"], &["i1"], "E1"),
                record("b", &["eval", "y"], &["i1", "i2"], "E1"),
                record("c", &["eval", "x"], &["i1"], "E1"),
            ],
            &cache,
        )
        .unwrap();
        assert_eq!(cluster.consensus_keywords(), vec!["eval".to_string(), "x".to_string()]);
        assert_eq!(cluster.consensus_indicators(), vec!["i1".to_string()]);
    }

    #[test]
    fn empty_cluster_is_rejected() {
        let cache = SimilarityCache::new(4);
        assert!(matches!(
            PatternCluster::from_members(vec![], &cache),
            Err(ClusteringError::EmptyCluster)
        ));
    }
}
