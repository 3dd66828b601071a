//! Partition workers. Each owns one correlator and drains one bounded queue.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fixloop_analysis::pairing::{EventCorrelator, FixOutcome, ScoredPair};
use fixloop_core::errors::{FixloopErrorCode, PipelineError};
use fixloop_core::events::{EventDispatcher, EventEnvelope, EventType, InboundEvent, PairCreatedEvent};
use fixloop_core::traits::{OutboundSink, PairStore};

use crate::rewards::{pair_outcome, RewardAttribution};

/// Processed findings between two evictions of finished correlation state.
const EVICT_EVERY: u64 = 256;

/// What processing one envelope produced, sent back once it is done.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventReceipt {
    pub event_id: Option<Uuid>,
    pub partition: usize,
    pub pair_id: Option<String>,
    pub promoted: bool,
    pub reintroduction_of: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl EventReceipt {
    pub(crate) fn failed(event_id: Option<Uuid>, partition: usize, error: &PipelineError) -> Self {
        Self {
            event_id,
            partition,
            error_code: Some(error.error_code().to_string()),
            error_message: Some(error.to_string()),
            ..Default::default()
        }
    }
}

pub(crate) enum WorkerMessage {
    Event {
        envelope: EventEnvelope,
        event: InboundEvent,
        ack: Sender<(usize, EventReceipt)>,
        slot: usize,
    },
    Shutdown,
}

/// Shared collaborators handed to every worker.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub pairs: Arc<dyn PairStore>,
    pub sink: Arc<dyn OutboundSink>,
    pub dispatcher: EventDispatcher,
    pub rewards: Arc<RewardAttribution>,
    pub source: String,
}

pub(crate) fn spawn(
    partition: usize,
    correlator: EventCorrelator,
    context: WorkerContext,
    inbox: Receiver<WorkerMessage>,
) -> Result<JoinHandle<()>, PipelineError> {
    thread::Builder::new()
        .name(format!("fixloop-worker-{partition}"))
        .spawn(move || run(partition, correlator, context, inbox))
        .map_err(|e| PipelineError::Worker(format!("worker {partition} failed to start: {e}")))
}

fn run(
    partition: usize,
    mut correlator: EventCorrelator,
    context: WorkerContext,
    inbox: Receiver<WorkerMessage>,
) {
    tracing::debug!(partition, "worker started");
    let mut processed = 0u64;
    for message in inbox {
        let (envelope, event, ack, slot) = match message {
            WorkerMessage::Event {
                envelope,
                event,
                ack,
                slot,
            } => (envelope, event, ack, slot),
            WorkerMessage::Shutdown => break,
        };
        let span = tracing::info_span!(
            "event",
            partition,
            event_id = %envelope.event_id,
            correlation_id = %envelope.correlation_id
        );
        let _guard = span.enter();

        let receipt = match panic::catch_unwind(AssertUnwindSafe(|| {
            process(partition, &mut correlator, &context, &envelope, event)
        })) {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "event processing failed");
                EventReceipt::failed(Some(envelope.event_id), partition, &e)
            }
            Err(_) => {
                let e = PipelineError::Worker("correlator panicked".to_string());
                tracing::error!(error = %e, "event processing panicked");
                EventReceipt::failed(Some(envelope.event_id), partition, &e)
            }
        };

        processed += 1;
        if processed % EVICT_EVERY == 0 {
            let evicted = correlator.evict_emitted();
            tracing::debug!(evicted, tracked = correlator.tracked_findings(), "correlation state evicted");
        }
        // The submitter may have given up waiting; the work is done either way.
        let _ = ack.send((slot, receipt));
    }
    tracing::debug!(partition, processed, "worker stopped");
}

fn process(
    partition: usize,
    correlator: &mut EventCorrelator,
    context: &WorkerContext,
    envelope: &EventEnvelope,
    event: InboundEvent,
) -> Result<EventReceipt, PipelineError> {
    let outcome = correlator.ingest(event);
    let mut receipt = EventReceipt {
        event_id: Some(envelope.event_id),
        partition,
        ..Default::default()
    };

    if let Some(signal) = outcome.reintroduction {
        context
            .rewards
            .record_pair(&signal.original_pair_id, FixOutcome::Reintroduced);
        receipt.reintroduction_of = Some(signal.original_pair_id);
    }

    if let Some(scored) = outcome.pair {
        receipt.pair_id = Some(scored.pair.pair_id.clone());
        receipt.promoted = scored.pair.promoted;
        persist_and_announce(context, envelope, &scored)?;
    }
    Ok(receipt)
}

fn persist_and_announce(
    context: &WorkerContext,
    envelope: &EventEnvelope,
    scored: &ScoredPair,
) -> Result<(), PipelineError> {
    let pair = &scored.pair;
    let created = context.pairs.store_pair(pair)?;
    tracing::info!(
        pair_id = %pair.pair_id,
        rule_id = %pair.rule_id,
        pairing_type = %pair.pairing_type,
        confidence = pair.confidence_score,
        promoted = pair.promoted,
        created,
        "pair stored"
    );
    if created {
        context.rewards.record_pair(&pair.pair_id, pair_outcome(pair));
    }
    if pair.promoted {
        context.rewards.check_violations(pair);
    }

    let event = PairCreatedEvent {
        pair: pair.clone(),
        causation_id: Some(envelope.event_id),
    };
    let outbound = EventEnvelope::outbound(
        EventType::PairCreated,
        &event,
        &envelope.correlation_id,
        Some(envelope.event_id),
        &context.source,
    )?;
    context.sink.publish(&outbound)?;
    context.dispatcher.emit_pair_created(&event);
    Ok(())
}
