//! Event envelopes, in-process handler fan-out and notification payloads.

pub mod dispatcher;
pub mod envelope;
pub mod handler;
pub mod types;

pub use dispatcher::EventDispatcher;
pub use envelope::{EventEnvelope, EventType, InboundEvent};
pub use handler::FixloopEventHandler;
pub use types::*;
