//! Pattern feature extraction.

pub mod extractor;
pub mod heuristics;
pub mod indicators;
pub mod syntax;

pub use extractor::{pair_domain, pair_sample, quality_band, CodeSample, FeatureExtractor};
pub use indicators::IndicatorMatcher;
