//! Scoring errors.

use super::error_code::{self, FixloopErrorCode};

/// Errors that can occur while building a scoring context for a pair.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Malformed hunk header: {0}")]
    MalformedHunkHeader(String),

    #[error("Missing {what} for finding {finding_id}")]
    MissingEvidence { finding_id: String, what: String },
}

impl FixloopErrorCode for ScoringError {
    fn error_code(&self) -> &'static str {
        error_code::SCORING_ERROR
    }
}
