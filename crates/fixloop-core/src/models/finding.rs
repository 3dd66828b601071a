//! Inbound review events: a finding observed, a fix applied, a resolution
//! confirmed by CI. Immutable once created.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EventError;

/// Finding severity as reported by the review tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Hint => "hint",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Inclusive line range. `start <= end` is checked by [`LineRange::new`]
/// and by the owning event's `validate()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Result<Self, EventError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if self.start > self.end {
            return Err(EventError::validation(
                "touched_line_range",
                format!("start {} is after end {}", self.start, self.end),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, line: u32) -> bool {
        (self.start..=self.end).contains(&line)
    }
}

/// A diagnostic reported by a review tool for one location in one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingObserved {
    pub finding_id: Uuid,
    pub repo: String,
    pub pr_id: String,
    pub rule_id: String,
    pub severity: Severity,
    pub file_path: String,
    pub line_start: u32,
    #[serde(default)]
    pub line_end: Option<u32>,
    pub tool_name: String,
    pub tool_version: String,
    pub normalized_message: String,
    pub raw_message: String,
    pub commit_sha_observed: String,
    pub observed_at: DateTime<Utc>,
}

impl FindingObserved {
    pub fn validate(&self) -> Result<(), EventError> {
        require_non_empty("repo", &self.repo)?;
        require_non_empty("pr_id", &self.pr_id)?;
        require_non_empty("rule_id", &self.rule_id)?;
        require_non_empty("file_path", &self.file_path)?;
        require_non_empty("commit_sha_observed", &self.commit_sha_observed)?;
        if self.line_start == 0 {
            return Err(EventError::validation("line_start", "lines are 1-based"));
        }
        if let Some(end) = self.line_end {
            if end < self.line_start {
                return Err(EventError::validation(
                    "line_end",
                    format!("{} is before line_start {}", end, self.line_start),
                ));
            }
        }
        Ok(())
    }

    /// The last line the finding covers.
    pub fn last_line(&self) -> u32 {
        self.line_end.unwrap_or(self.line_start)
    }
}

/// A fix applied for a finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixApplied {
    pub fix_id: Uuid,
    pub finding_id: Uuid,
    pub fix_commit_sha: String,
    pub file_path: String,
    /// Ordered unified-diff hunks, each starting with its `@@` header.
    pub diff_hunks: Vec<String>,
    pub touched_line_range: LineRange,
    pub tool_autofix: bool,
    pub applied_at: DateTime<Utc>,
    /// Rule the fixing tool claims to address, when it declares one.
    #[serde(default)]
    pub rule_id: Option<String>,
}

impl FixApplied {
    pub fn validate(&self) -> Result<(), EventError> {
        require_non_empty("fix_commit_sha", &self.fix_commit_sha)?;
        require_non_empty("file_path", &self.file_path)?;
        self.touched_line_range.validate()
    }
}

/// Independent CI confirmation that a finding no longer reproduces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingResolved {
    pub resolution_id: Uuid,
    pub finding_id: Uuid,
    pub fix_commit_sha: String,
    pub verified_at_commit_sha: String,
    pub ci_run_id: String,
    pub resolved_at: DateTime<Utc>,
}

impl FindingResolved {
    pub fn validate(&self) -> Result<(), EventError> {
        require_non_empty("fix_commit_sha", &self.fix_commit_sha)?;
        require_non_empty("verified_at_commit_sha", &self.verified_at_commit_sha)?;
        require_non_empty("ci_run_id", &self.ci_run_id)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), EventError> {
    if value.trim().is_empty() {
        return Err(EventError::validation(field, "must not be empty"));
    }
    Ok(())
}
