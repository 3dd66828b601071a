//! Pipeline errors and non-fatal error collection.

use super::error_code::{self, FixloopErrorCode};
use super::{
    ClusteringError, CodemodError, ConfigError, EventError, PublishError, ScoringError,
    StorageError,
};

/// Errors that can occur during a promotion run or event processing.
/// Aggregates subsystem errors via `From` conversions.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Clustering error: {0}")]
    Clustering(#[from] ClusteringError),

    #[error("Codemod error: {0}")]
    Codemod(#[from] CodemodError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Worker unavailable: {0}")]
    Worker(String),

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl FixloopErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Event(e) => e.error_code(),
            Self::Scoring(e) => e.error_code(),
            Self::Clustering(e) => e.error_code(),
            Self::Codemod(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
            Self::Publish(e) => e.error_code(),
            Self::Worker(_) => error_code::WORKER_ERROR,
            Self::Cancelled => error_code::CANCELLED,
        }
    }
}

/// Result of a pipeline run that accumulates non-fatal errors.
/// Partial results are returned even when some patterns fail.
#[derive(Debug, Default)]
pub struct PipelineResult<T: Default = ()> {
    /// The successful result data.
    pub data: T,
    /// Non-fatal errors collected during the run.
    pub errors: Vec<PipelineError>,
}

impl<T: Default> PipelineResult<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: PipelineError) {
        self.errors.push(error);
    }

    /// Returns true if there are no non-fatal errors.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Outcome envelope returned by public runtime operations.
///
/// Carries either the value or a typed failure; public operations return
/// this instead of panicking across the boundary.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OperationOutcome<T> {
    pub success: bool,
    pub value: Option<T>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl<T> OperationOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
            error_code: None,
            error_message: None,
        }
    }

    pub fn failed<E: FixloopErrorCode + std::fmt::Display>(error: &E) -> Self {
        Self {
            success: false,
            value: None,
            error_code: Some(error.error_code().to_string()),
            error_message: Some(error.to_string()),
        }
    }
}

impl<T, E> From<Result<T, E>> for OperationOutcome<T>
where
    E: FixloopErrorCode + std::fmt::Display,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::failed(&e),
        }
    }
}
