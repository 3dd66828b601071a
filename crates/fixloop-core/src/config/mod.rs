//! Configuration system for fixloop.
//! TOML-based: defaults, then `fixloop.toml`, then `FIXLOOP_*` env.

pub mod clustering_config;
pub mod codemod_config;
pub mod correlation_config;
pub mod fixloop_config;
pub mod lifecycle_config;
pub mod runtime_config;
pub mod scoring_config;
pub mod storage_config;

pub use clustering_config::ClusteringConfig;
pub use codemod_config::CodemodConfig;
pub use correlation_config::CorrelationConfig;
pub use fixloop_config::FixloopConfig;
pub use lifecycle_config::LifecycleConfig;
pub use runtime_config::RuntimeConfig;
pub use scoring_config::ScoringConfig;
pub use storage_config::StorageConfig;
