//! Auditable decision records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    PatternCreated,
    PatternPromoted,
    PatternDemoted,
    CodemodValidation,
    ModelSelection,
}

impl DecisionType {
    pub const ALL: [DecisionType; 5] = [
        Self::PatternCreated,
        Self::PatternPromoted,
        Self::PatternDemoted,
        Self::CodemodValidation,
        Self::ModelSelection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PatternCreated => "pattern_created",
            Self::PatternPromoted => "pattern_promoted",
            Self::PatternDemoted => "pattern_demoted",
            Self::CodemodValidation => "codemod_validation",
            Self::ModelSelection => "model_selection",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == s)
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Field visibility when reading a decision back.
///
/// Layer 1 omits `agent_rationale`; Layer 2 includes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Layer1,
    Layer2,
}

/// A recorded decision, keyed by its caller-supplied `decision_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: String,
    pub decision_type: DecisionType,
    pub timestamp: DateTime<Utc>,
    pub candidates_considered: Vec<String>,
    pub constraints_applied: Vec<String>,
    pub scoring_breakdown: BTreeMap<String, f64>,
    pub tie_breaker: Option<String>,
    pub selected_candidate: String,
    pub agent_rationale: Option<String>,
    /// Everything needed to re-derive the decision without live state.
    pub reproducibility_snapshot: BTreeMap<String, String>,
    pub stored_at: DateTime<Utc>,
}

impl DecisionRecord {
    /// Strip Layer 2 fields.
    pub fn into_layer(mut self, visibility: Visibility) -> Self {
        if visibility == Visibility::Layer1 {
            self.agent_rationale = None;
        }
        self
    }
}
