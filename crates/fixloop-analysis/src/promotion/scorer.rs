//! Promotion confidence of a pattern cluster.
//!
//! `confidence = 0.40 * label_agreement + 0.30 * cluster_cohesion
//! + 0.30 * frequency_factor`. Label agreement and cohesion are read from
//! the cluster as-is.

use std::fmt;

use serde::{Deserialize, Serialize};

use fixloop_core::config::LifecycleConfig;
use fixloop_core::models::ConfidenceComponents;

use crate::aggregation::PatternCluster;

pub const LABEL_AGREEMENT_WEIGHT: f64 = 0.40;
pub const COHESION_WEIGHT: f64 = 0.30;
pub const FREQUENCY_WEIGHT: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceComponent {
    LabelAgreement,
    ClusterCohesion,
    FrequencyFactor,
}

impl ConfidenceComponent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LabelAgreement => "label_agreement",
            Self::ClusterCohesion => "cluster_cohesion",
            Self::FrequencyFactor => "frequency_factor",
        }
    }
}

impl fmt::Display for ConfidenceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scored cluster. Callers making irreversible decisions should look at
/// `components` and `dominant`, not only `confidence`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternScore {
    pub confidence: f64,
    pub components: ConfidenceComponents,
    /// Component with the largest weighted contribution.
    pub dominant: ConfidenceComponent,
    pub member_count: u32,
}

#[derive(Debug, Clone)]
pub struct PatternScorer {
    min_frequency: u32,
}

impl PatternScorer {
    pub fn new(config: &LifecycleConfig) -> Self {
        Self {
            min_frequency: config.effective_min_frequency().max(1),
        }
    }

    pub fn score(&self, cluster: &PatternCluster) -> PatternScore {
        self.score_components(
            cluster.label_agreement(),
            cluster.internal_similarity(),
            cluster.member_count(),
        )
    }

    pub fn score_components(
        &self,
        label_agreement: f64,
        cluster_cohesion: f64,
        member_count: u32,
    ) -> PatternScore {
        let frequency_factor = (member_count as f64 / self.min_frequency as f64).min(1.0);
        let components = ConfidenceComponents {
            label_agreement: label_agreement.clamp(0.0, 1.0),
            cluster_cohesion: cluster_cohesion.clamp(0.0, 1.0),
            frequency_factor,
        };
        let weighted = [
            (
                ConfidenceComponent::LabelAgreement,
                LABEL_AGREEMENT_WEIGHT * components.label_agreement,
            ),
            (
                ConfidenceComponent::ClusterCohesion,
                COHESION_WEIGHT * components.cluster_cohesion,
            ),
            (
                ConfidenceComponent::FrequencyFactor,
                FREQUENCY_WEIGHT * components.frequency_factor,
            ),
        ];
        let mut dominant = weighted[0];
        for entry in &weighted[1..] {
            if entry.1 > dominant.1 {
                dominant = *entry;
            }
        }
        let confidence = weighted.iter().map(|(_, v)| v).sum::<f64>().clamp(0.0, 1.0);
        PatternScore {
            confidence,
            components,
            dominant: dominant.0,
            member_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> PatternScorer {
        PatternScorer::new(&LifecycleConfig::default())
    }

    #[test]
    fn frequency_saturates_at_min_frequency() {
        let s = scorer().score_components(1.0, 1.0, 12);
        assert_eq!(s.components.frequency_factor, 1.0);
        assert!((s.confidence - 1.0).abs() < 1e-9);
        let s = scorer().score_components(1.0, 1.0, 2);
        assert!((s.components.frequency_factor - 0.4).abs() < 1e-9);
    }

    #[test]
    fn five_cohesive_members_clear_the_validated_bar() {
        let s = scorer().score_components(1.0, 0.8, 5);
        assert!(s.confidence >= 0.75);
        assert_eq!(s.dominant, ConfidenceComponent::LabelAgreement);
    }

    #[test]
    fn frequency_alone_dominates_a_loose_cluster() {
        let s = scorer().score_components(0.2, 0.1, 50);
        assert_eq!(s.dominant, ConfidenceComponent::FrequencyFactor);
    }
}
