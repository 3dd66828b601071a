//! Pattern lifecycle: candidate → provisional → validated → deprecated.
//!
//! At most one transition per evaluation. Deprecated is terminal; a
//! lineage comes back only through an explicit re-promotion, which starts a
//! new version as candidate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fixloop_core::config::LifecycleConfig;
use fixloop_core::models::{LearnedPattern, PatternState};

use super::scorer::PatternScore;
use crate::pairing::RewardStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    ConfidenceThreshold,
    SustainedConfidence,
    Reintroduction,
    RepeatedViolations,
    LowReward,
    Repromotion,
}

impl TransitionReason {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConfidenceThreshold => "confidence_threshold",
            Self::SustainedConfidence => "sustained_confidence",
            Self::Reintroduction => "reintroduction",
            Self::RepeatedViolations => "repeated_violations",
            Self::LowReward => "low_reward",
            Self::Repromotion => "repromotion",
        }
    }

    pub fn is_demotion(&self) -> bool {
        matches!(
            self,
            Self::Reintroduction | Self::RepeatedViolations | Self::LowReward
        )
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signals beyond the cluster score that can demote a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LifecycleEvidence {
    /// A finding fixed by one of the pattern's pairs came back.
    pub reintroduced: bool,
    pub reward: RewardStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecycleDecision {
    /// No state change; `sustained_runs` may still have moved.
    Unchanged { sustained_runs: u32 },
    Transition {
        from: PatternState,
        to: PatternState,
        reason: TransitionReason,
        sustained_runs: u32,
    },
}

impl LifecycleDecision {
    pub fn sustained_runs(&self) -> u32 {
        match self {
            Self::Unchanged { sustained_runs } | Self::Transition { sustained_runs, .. } => {
                *sustained_runs
            }
        }
    }

    pub fn target_state(&self) -> Option<PatternState> {
        match self {
            Self::Unchanged { .. } => None,
            Self::Transition { to, .. } => Some(*to),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleStateMachine {
    provisional_threshold: f64,
    validated_threshold: f64,
    min_members: u32,
    sustained_runs_required: u32,
    repeated_violation_limit: u32,
    low_reward_threshold: f64,
    min_reward_observations: u32,
}

impl LifecycleStateMachine {
    pub fn new(config: &LifecycleConfig) -> Self {
        Self {
            provisional_threshold: config.effective_provisional_threshold(),
            validated_threshold: config.effective_validated_threshold(),
            min_members: config.effective_min_members(),
            sustained_runs_required: config.effective_sustained_runs_required().max(1),
            repeated_violation_limit: config.effective_repeated_violation_limit().max(1),
            low_reward_threshold: config.effective_low_reward_threshold(),
            min_reward_observations: config.effective_min_reward_observations(),
        }
    }

    pub fn validated_threshold(&self) -> f64 {
        self.validated_threshold
    }

    /// Decide the next step for the current row of a lineage.
    pub fn evaluate(
        &self,
        current: &LearnedPattern,
        score: &PatternScore,
        evidence: &LifecycleEvidence,
    ) -> LifecycleDecision {
        let from = current.state;
        if from.is_terminal() {
            return LifecycleDecision::Unchanged {
                sustained_runs: current.sustained_runs,
            };
        }

        let sustained_runs = if score.confidence >= self.validated_threshold {
            current.sustained_runs.saturating_add(1)
        } else {
            0
        };

        if matches!(from, PatternState::Provisional | PatternState::Validated) {
            if let Some(reason) = self.demotion_reason(evidence) {
                return LifecycleDecision::Transition {
                    from,
                    to: PatternState::Deprecated,
                    reason,
                    sustained_runs: 0,
                };
            }
        }

        match from {
            PatternState::Candidate
                if score.confidence >= self.provisional_threshold
                    && score.member_count >= self.min_members =>
            {
                LifecycleDecision::Transition {
                    from,
                    to: PatternState::Provisional,
                    reason: TransitionReason::ConfidenceThreshold,
                    sustained_runs,
                }
            }
            PatternState::Provisional if sustained_runs >= self.sustained_runs_required => {
                LifecycleDecision::Transition {
                    from,
                    to: PatternState::Validated,
                    reason: TransitionReason::SustainedConfidence,
                    sustained_runs,
                }
            }
            _ => LifecycleDecision::Unchanged { sustained_runs },
        }
    }

    /// Demotion check for a lineage the current run did not re-cluster.
    /// Only provisional and validated rows can demote.
    pub fn demotion_for(
        &self,
        current: &LearnedPattern,
        evidence: &LifecycleEvidence,
    ) -> Option<TransitionReason> {
        if !current.state.is_injectable() {
            return None;
        }
        self.demotion_reason(evidence)
    }

    fn demotion_reason(&self, evidence: &LifecycleEvidence) -> Option<TransitionReason> {
        if evidence.reintroduced || evidence.reward.reintroductions > 0 {
            return Some(TransitionReason::Reintroduction);
        }
        if evidence.reward.violations >= self.repeated_violation_limit {
            return Some(TransitionReason::RepeatedViolations);
        }
        if evidence.reward.observations >= self.min_reward_observations
            && evidence.reward.average < self.low_reward_threshold
        {
            return Some(TransitionReason::LowReward);
        }
        None
    }

    /// The row that follows `current` after a transition to `to`: the next
    /// version, current, with refreshed evaluation fields.
    pub fn next_version(
        current: &LearnedPattern,
        to: PatternState,
        score: &PatternScore,
        sustained_runs: u32,
        member_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> LearnedPattern {
        let version = current.version + 1;
        LearnedPattern {
            pattern_id: LearnedPattern::derive_id(&current.signature, &current.domain, version),
            signature: current.signature.clone(),
            domain: current.domain.clone(),
            version,
            pattern_type: current.pattern_type.clone(),
            confidence: score.confidence,
            components: score.components,
            state: to,
            is_current: true,
            member_count: score.member_count,
            sustained_runs,
            member_ids,
            stored_at: now,
            source_run_id: current.source_run_id.clone(),
            correlation_id: current.correlation_id.clone(),
        }
    }

    /// The deprecated row that follows `current` when it demotes without a
    /// fresh cluster score: evaluation fields carry over unchanged.
    pub fn deprecated_version(current: &LearnedPattern, now: DateTime<Utc>) -> LearnedPattern {
        let version = current.version + 1;
        LearnedPattern {
            pattern_id: LearnedPattern::derive_id(&current.signature, &current.domain, version),
            version,
            state: PatternState::Deprecated,
            is_current: true,
            sustained_runs: 0,
            stored_at: now,
            ..current.clone()
        }
    }

    /// Explicit re-promotion of a deprecated lineage: a new candidate
    /// version with no sustained history. `None` unless `latest` is
    /// deprecated.
    pub fn repromote(latest: &LearnedPattern, now: DateTime<Utc>) -> Option<LearnedPattern> {
        if latest.state != PatternState::Deprecated {
            return None;
        }
        let version = latest.version + 1;
        Some(LearnedPattern {
            pattern_id: LearnedPattern::derive_id(&latest.signature, &latest.domain, version),
            version,
            state: PatternState::Candidate,
            is_current: true,
            sustained_runs: 0,
            stored_at: now,
            ..latest.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotion::scorer::PatternScorer;
    use fixloop_core::models::ConfidenceComponents;

    fn pattern(state: PatternState, sustained_runs: u32) -> LearnedPattern {
        LearnedPattern {
            pattern_id: LearnedPattern::derive_id("sig-v1:abc", "python", 1),
            signature: "sig-v1:abc".into(),
            domain: "python".into(),
            version: 1,
            pattern_type: "E1".into(),
            confidence: 0.0,
            components: ConfidenceComponents::default(),
            state,
            is_current: true,
            member_count: 0,
            sustained_runs,
            member_ids: vec![],
            stored_at: Utc::now(),
            source_run_id: None,
            correlation_id: None,
        }
    }

    fn machine() -> LifecycleStateMachine {
        LifecycleStateMachine::new(&LifecycleConfig::default())
    }

    fn score(label: f64, cohesion: f64, members: u32) -> PatternScore {
        PatternScorer::new(&LifecycleConfig::default()).score_components(label, cohesion, members)
    }

    #[test]
    fn candidate_needs_confidence_and_members() {
        let m = machine();
        let d = m.evaluate(&pattern(PatternState::Candidate, 0), &score(1.0, 1.0, 2), &Default::default());
        // 0.4 + 0.3 + 0.3 * 0.4 = 0.82 but only two members.
        assert_eq!(d, LifecycleDecision::Unchanged { sustained_runs: 1 });

        let d = m.evaluate(&pattern(PatternState::Candidate, 0), &score(1.0, 1.0, 5), &Default::default());
        assert_eq!(d.target_state(), Some(PatternState::Provisional));
        assert_eq!(d.sustained_runs(), 1);
    }

    #[test]
    fn provisional_validates_after_sustained_runs() {
        let m = machine();
        let d = m.evaluate(&pattern(PatternState::Provisional, 1), &score(1.0, 0.9, 5), &Default::default());
        assert_eq!(d.target_state(), Some(PatternState::Validated));

        let d = m.evaluate(&pattern(PatternState::Provisional, 0), &score(1.0, 0.9, 5), &Default::default());
        assert_eq!(d, LifecycleDecision::Unchanged { sustained_runs: 1 });
    }

    #[test]
    fn dip_below_bar_resets_sustained_runs() {
        let d = machine().evaluate(&pattern(PatternState::Provisional, 1), &score(0.5, 0.5, 3), &Default::default());
        assert_eq!(d, LifecycleDecision::Unchanged { sustained_runs: 0 });
    }

    #[test]
    fn validated_demotes_on_reintroduction() {
        let evidence = LifecycleEvidence {
            reintroduced: true,
            ..Default::default()
        };
        let d = machine().evaluate(&pattern(PatternState::Validated, 4), &score(1.0, 1.0, 9), &evidence);
        match d {
            LifecycleDecision::Transition { to, reason, .. } => {
                assert_eq!(to, PatternState::Deprecated);
                assert_eq!(reason, TransitionReason::Reintroduction);
            }
            other => panic!("expected demotion, got {other:?}"),
        }
    }

    #[test]
    fn repeated_violations_and_low_reward_demote() {
        let m = machine();
        let violations = LifecycleEvidence {
            reintroduced: false,
            reward: RewardStats {
                average: 0.5,
                observations: 6,
                violations: 3,
                reintroductions: 0,
            },
        };
        let d = m.evaluate(&pattern(PatternState::Validated, 3), &score(1.0, 1.0, 9), &violations);
        assert!(matches!(d, LifecycleDecision::Transition { reason: TransitionReason::RepeatedViolations, .. }));

        let low = LifecycleEvidence {
            reintroduced: false,
            reward: RewardStats {
                average: -0.5,
                observations: 5,
                violations: 0,
                reintroductions: 0,
            },
        };
        let d = m.evaluate(&pattern(PatternState::Provisional, 0), &score(1.0, 1.0, 9), &low);
        assert!(matches!(d, LifecycleDecision::Transition { reason: TransitionReason::LowReward, .. }));
    }

    #[test]
    fn candidates_are_not_demoted_and_deprecated_is_terminal() {
        let m = machine();
        let evidence = LifecycleEvidence {
            reintroduced: true,
            ..Default::default()
        };
        let d = m.evaluate(&pattern(PatternState::Candidate, 0), &score(0.1, 0.1, 1), &evidence);
        assert!(matches!(d, LifecycleDecision::Unchanged { .. }));
        let d = m.evaluate(&pattern(PatternState::Deprecated, 0), &score(1.0, 1.0, 9), &Default::default());
        assert!(matches!(d, LifecycleDecision::Unchanged { .. }));
    }

    #[test]
    fn unclustered_lineage_demotes_from_evidence_alone() {
        let m = machine();
        let evidence = LifecycleEvidence {
            reintroduced: true,
            ..Default::default()
        };
        let validated = pattern(PatternState::Validated, 3);
        assert_eq!(m.demotion_for(&validated, &evidence), Some(TransitionReason::Reintroduction));
        assert_eq!(m.demotion_for(&validated, &Default::default()), None);
        assert_eq!(m.demotion_for(&pattern(PatternState::Candidate, 0), &evidence), None);

        let next = LifecycleStateMachine::deprecated_version(&validated, Utc::now());
        assert_eq!(next.version, 2);
        assert_eq!(next.state, PatternState::Deprecated);
        assert_eq!(next.signature, validated.signature);
        assert_eq!(next.sustained_runs, 0);
    }

    #[test]
    fn repromotion_starts_new_candidate_version() {
        let now = Utc::now();
        assert!(LifecycleStateMachine::repromote(&pattern(PatternState::Validated, 0), now).is_none());
        let next = LifecycleStateMachine::repromote(&pattern(PatternState::Deprecated, 0), now).unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(next.state, PatternState::Candidate);
        assert_ne!(next.pattern_id, pattern(PatternState::Deprecated, 0).pattern_id);
    }
}
