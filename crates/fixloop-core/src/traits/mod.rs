//! Trait seams between the pipeline and its collaborators.

pub mod cancellation;
pub mod change_index;
pub mod collaborators;
pub mod store;

pub use cancellation::{Cancellable, CancellationToken};
pub use change_index::{ChangeIndex, InMemoryChangeIndex};
pub use collaborators::{
    OutboundSink, PublicationRequest, QualityReport, QualityScorer, ReviewPublisher,
};
pub use store::{
    CodemodStore, DecisionFilter, DecisionStore, Page, PairStore, PatternRepository,
    PublicationLedger, WatermarkStore,
};
