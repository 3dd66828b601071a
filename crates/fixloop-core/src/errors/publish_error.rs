//! Review publisher errors.

use super::error_code::{self, FixloopErrorCode};

/// Errors surfaced by a review publisher collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publisher rejected request for {pr}: {message}")]
    Rejected { pr: String, message: String },

    #[error("Publication ledger unavailable: {0}")]
    Ledger(String),
}

impl FixloopErrorCode for PublishError {
    fn error_code(&self) -> &'static str {
        error_code::PUBLISH_ERROR
    }
}
