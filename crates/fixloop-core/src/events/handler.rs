//! Event handler trait with no-op defaults.

use super::types::*;

/// Receives pipeline notifications. Implement only the methods you need.
pub trait FixloopEventHandler: Send + Sync {
    fn on_pair_created(&self, _event: &PairCreatedEvent) {}
    fn on_pattern_promoted(&self, _event: &PatternPromotedEvent) {}
    fn on_pattern_demoted(&self, _event: &PatternDemotedEvent) {}
    fn on_codemod_validated(&self, _event: &CodemodValidatedEvent) {}
    fn on_near_threshold(&self, _event: &NearThresholdEvent) {}
    fn on_event_rejected(&self, _event: &EventRejectedEvent) {}
}
