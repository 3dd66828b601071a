//! Finding/fix pair confidence scoring.

pub mod hunks;
pub mod scorer;
pub mod types;

pub use hunks::{is_anchored, parse_hunks, DiffLine, HunkHeader, ParsedHunk};
pub use scorer::{is_formatter_batch, ConfidenceScorer};
pub use types::{ScoreBreakdown, ScoreResult, ScoringContext};
