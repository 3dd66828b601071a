//! Pattern scoring, signatures and lifecycle.

pub mod lifecycle;
pub mod scorer;
pub mod signature;

pub use lifecycle::{LifecycleDecision, LifecycleEvidence, LifecycleStateMachine, TransitionReason};
pub use scorer::{ConfidenceComponent, PatternScore, PatternScorer};
pub use signature::{PatternSignature, SignatureInputs};
