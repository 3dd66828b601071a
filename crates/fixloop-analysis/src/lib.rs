//! # fixloop-analysis
//!
//! The analysis engine of the promotion pipeline: finding/fix pair
//! scoring and correlation, outcome rewards, feature extraction,
//! similarity clustering, pattern promotion, and codemod generation with
//! replay validation.

pub mod aggregation;
pub mod codemod;
pub mod features;
pub mod pairing;
pub mod promotion;
pub mod scoring;

pub use aggregation::{AggregationPipeline, PatternCluster};
pub use codemod::{CodemodGenerator, ReplayValidator};
pub use features::FeatureExtractor;
pub use pairing::EventCorrelator;
pub use promotion::{LifecycleStateMachine, PatternScorer, PatternSignature};
pub use scoring::ConfidenceScorer;
