//! # fixloop-core
//!
//! Foundation crate for the fixloop promotion pipeline.
//! Defines the event models, errors, configuration, inbound/outbound
//! envelopes, collaborator traits, tracing setup and shared constants.

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod models;
pub mod traits;
pub mod tracing;

pub use errors::{FixloopErrorCode, PipelineError, PipelineResult};
