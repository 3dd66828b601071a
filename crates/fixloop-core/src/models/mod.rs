//! Domain records shared across the pipeline.

pub mod codemod;
pub mod decision;
pub mod features;
pub mod finding;
pub mod pair;
pub mod pattern;

pub use codemod::{CodemodDefinition, CodemodStatus, ReplayResult};
pub use decision::{DecisionRecord, DecisionType, Visibility};
pub use features::{ExtractionQuality, FeatureRecord, SourceLanguage, StructuralFeatures};
pub use finding::{FindingObserved, FindingResolved, FixApplied, LineRange, Severity};
pub use pair::{FindingFixPair, PairingType};
pub use pattern::{ConfidenceComponents, LearnedPattern, PatternState};
