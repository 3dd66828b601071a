//! # fixloop-runtime
//!
//! Wires storage, the analysis engine and the outbound collaborators into
//! one explicitly constructed [`FixloopRuntime`]:
//!
//! - inbound envelopes are routed to partition workers by repo and paired
//!   there, each worker owning its correlator;
//! - promotion runs re-cluster promoted pairs and move pattern lineages
//!   through their lifecycle;
//! - publication to the review host is idempotent per PR and finding set.

pub mod partition;
pub mod promotion;
pub mod publisher;
pub mod rewards;
pub mod runtime;
pub mod worker;

pub use partition::PartitionRouter;
pub use promotion::{
    CodemodSummary, PromotionPipeline, PromotionReport, PromotionStores, RunTrigger,
    TransitionSummary, PROMOTION_WATERMARK,
};
pub use publisher::{IdempotentPublisher, PublishOutcome};
pub use rewards::RewardAttribution;
pub use runtime::{BatchReceipt, FixloopRuntime};
pub use worker::EventReceipt;

/// Emit one metric sample as a structured event under `fixloop::metrics`.
pub(crate) fn record_metric(name: &'static str, value: f64) {
    tracing::info!(target: "fixloop::metrics", metric = name, value, "metric");
}
