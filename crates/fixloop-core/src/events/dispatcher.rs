//! EventDispatcher: synchronous fan-out to registered handlers.

use std::sync::Arc;

use super::handler::FixloopEventHandler;
use super::types::*;

/// Synchronous event dispatcher wrapping a list of handlers.
///
/// A panicking handler is logged and does not prevent later handlers
/// from receiving the event.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn FixloopEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn FixloopEventHandler>) {
        self.handlers.push(handler);
    }

    fn emit<F: Fn(&dyn FixloopEventHandler)>(&self, name: &str, f: F) {
        for handler in &self.handlers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                f(handler.as_ref());
            }));
            if result.is_err() {
                tracing::warn!(event = name, "event handler panicked");
            }
        }
    }

    pub fn emit_pair_created(&self, event: &PairCreatedEvent) {
        self.emit("pair_created", |h| h.on_pair_created(event));
    }

    pub fn emit_pattern_promoted(&self, event: &PatternPromotedEvent) {
        self.emit("pattern_promoted", |h| h.on_pattern_promoted(event));
    }

    pub fn emit_pattern_demoted(&self, event: &PatternDemotedEvent) {
        self.emit("pattern_demoted", |h| h.on_pattern_demoted(event));
    }

    pub fn emit_codemod_validated(&self, event: &CodemodValidatedEvent) {
        self.emit("codemod_validated", |h| h.on_codemod_validated(event));
    }

    pub fn emit_near_threshold(&self, event: &NearThresholdEvent) {
        self.emit("near_threshold", |h| h.on_near_threshold(event));
    }

    pub fn emit_event_rejected(&self, event: &EventRejectedEvent) {
        self.emit("event_rejected", |h| h.on_event_rejected(event));
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
