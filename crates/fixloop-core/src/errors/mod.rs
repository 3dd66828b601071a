//! Error handling for fixloop.
//! One error enum per subsystem, `thiserror` only.

pub mod clustering_error;
pub mod codemod_error;
pub mod config_error;
pub mod error_code;
pub mod event_error;
pub mod pipeline_error;
pub mod publish_error;
pub mod sandbox_error;
pub mod scoring_error;
pub mod storage_error;

pub use clustering_error::ClusteringError;
pub use codemod_error::CodemodError;
pub use config_error::ConfigError;
pub use error_code::FixloopErrorCode;
pub use event_error::EventError;
pub use pipeline_error::{OperationOutcome, PipelineError, PipelineResult};
pub use publish_error::PublishError;
pub use sandbox_error::SandboxError;
pub use scoring_error::ScoringError;
pub use storage_error::StorageError;
