//! Codemod definitions and replay results.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validation status of a codemod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodemodStatus {
    Pending,
    Validated,
    Failed,
    Rejected,
}

impl CodemodStatus {
    pub const ALL: [CodemodStatus; 4] =
        [Self::Pending, Self::Validated, Self::Failed, Self::Rejected];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.name() == s)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for CodemodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of replaying a codemod against recorded before/after evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    pub passed: bool,
    pub cases_passed: u32,
    pub cases_failed: u32,
    pub failing_case_ids: BTreeSet<String>,
    pub failure_details: Vec<String>,
    pub validated_at: DateTime<Utc>,
}

impl ReplayResult {
    /// True when every case ran and passed, and there was at least one.
    pub fn is_complete_pass(&self) -> bool {
        self.passed && self.cases_failed == 0 && self.cases_passed > 0
    }
}

/// A generated source-to-source transformation for one pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodemodDefinition {
    pub codemod_id: String,
    pub pattern_id: String,
    pub rule_id: String,
    pub language: String,
    pub codemod_source: String,
    pub transform_signature: String,
    pub status: CodemodStatus,
    pub replay_result: Option<ReplayResult>,
}

impl CodemodDefinition {
    /// Consumers may only see validated codemods with a complete passing replay.
    pub fn is_exposable(&self) -> bool {
        self.status == CodemodStatus::Validated
            && self
                .replay_result
                .as_ref()
                .is_some_and(ReplayResult::is_complete_pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_non_terminal() {
        for status in CodemodStatus::ALL {
            assert_eq!(status.is_terminal(), status != CodemodStatus::Pending);
        }
    }
}
