//! Replay sandbox errors. These are recorded as failing cases, never
//! propagated out of a replay run.

use super::error_code::{self, FixloopErrorCode};

/// Reasons a single replay case could not produce output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SandboxError {
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Output exceeded budget of {limit} bytes")]
    OutputBudgetExceeded { limit: usize },

    #[error("Transform panicked: {0}")]
    Panicked(String),

    #[error("Transform failed: {0}")]
    Execution(String),
}

impl FixloopErrorCode for SandboxError {
    fn error_code(&self) -> &'static str {
        error_code::SANDBOX_ERROR
    }
}
