//! Codemod generation and static-check errors.

use super::error_code::{self, FixloopErrorCode};

/// Errors that can occur while generating or statically checking a codemod.
#[derive(Debug, thiserror::Error)]
pub enum CodemodError {
    #[error("No deterministic fix for pattern {pattern_id}: {reason}")]
    NoDeterministicFix { pattern_id: String, reason: String },

    #[error("Codemod source is not valid TOML: {0}")]
    Syntax(String),

    #[error("Codemod interface invalid: {0}")]
    Interface(String),

    #[error("Step {index} failed to compile: {message}")]
    StepCompilation { index: usize, message: String },
}

impl FixloopErrorCode for CodemodError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoDeterministicFix { .. } => error_code::NO_DETERMINISTIC_FIX,
            _ => error_code::CODEMOD_ERROR,
        }
    }
}
