//! Pairing of findings with fixes, outcome rewards and pairing health.

pub mod correlator;
pub mod metrics;
pub mod reintroduction;
pub mod reward;

pub use correlator::{contains_token, offending_token, CorrelationOutcome, EventCorrelator, ScoredPair};
pub use metrics::PairingMetrics;
pub use reintroduction::{FindingFingerprint, ReintroductionSignal, ReintroductionTracker};
pub use reward::{FixOutcome, RewardLedger, RewardStats};
