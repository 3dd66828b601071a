//! The explicitly constructed runtime: storage, partition workers and the
//! promotion pipeline wired together. Nothing here is global; every
//! collaborator is handed in by the caller.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, unbounded, Sender};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fixloop_analysis::pairing::{EventCorrelator, FixOutcome};
use fixloop_core::config::FixloopConfig;
use fixloop_core::errors::{EventError, FixloopErrorCode, OperationOutcome, PipelineError, PipelineResult};
use fixloop_core::events::{EventDispatcher, EventEnvelope, EventRejectedEvent, InboundEvent};
use fixloop_core::models::LearnedPattern;
use fixloop_core::tracing::metrics;
use fixloop_core::traits::{Cancellable, CancellationToken, ChangeIndex, OutboundSink, ReviewPublisher};
use fixloop_storage::StorageEngine;

use crate::partition::PartitionRouter;
use crate::promotion::{PromotionPipeline, PromotionReport, PromotionStores, RunTrigger};
use crate::publisher::IdempotentPublisher;
use crate::record_metric;
use crate::rewards::RewardAttribution;
use crate::worker::{self, EventReceipt, WorkerContext, WorkerMessage};

/// Findings whose repo the router remembers, per worker.
const REMEMBERED_FINDINGS_PER_WORKER: u64 = 16_384;
/// Pairs whose fix outcomes are kept for demotion evidence.
const REMEMBERED_PAIR_OUTCOMES: u64 = 262_144;

/// Receipts of one submitted batch, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub receipts: Vec<EventReceipt>,
    pub pairs_created: usize,
    pub pairs_promoted: usize,
    pub rejected: usize,
}

pub struct FixloopRuntime {
    engine: Arc<StorageEngine>,
    router: PartitionRouter,
    inboxes: Vec<Sender<WorkerMessage>>,
    handles: Vec<JoinHandle<()>>,
    promotion: PromotionPipeline,
    /// One promotion run at a time.
    run_lock: Mutex<()>,
    rewards: Arc<RewardAttribution>,
    dispatcher: EventDispatcher,
    cancel: CancellationToken,
}

impl FixloopRuntime {
    /// Spawn one worker per partition, each with its own correlator and
    /// bounded inbox.
    pub fn start(
        config: &FixloopConfig,
        engine: Arc<StorageEngine>,
        change_index: Arc<dyn ChangeIndex>,
        sink: Arc<dyn OutboundSink>,
        dispatcher: EventDispatcher,
    ) -> Result<Self, PipelineError> {
        let workers = config.runtime.effective_workers();
        let capacity = config.runtime.effective_channel_capacity();
        let idle = std::time::Duration::from_secs(
            u64::from(config.storage.effective_evidence_window_days()) * 24 * 60 * 60,
        );
        let rewards = Arc::new(RewardAttribution::with_limits(REMEMBERED_PAIR_OUTCOMES, idle));
        let context = WorkerContext {
            pairs: engine.clone(),
            sink: Arc::clone(&sink),
            dispatcher: dispatcher.clone(),
            rewards: Arc::clone(&rewards),
            source: config.runtime.effective_source_name(),
        };

        let mut inboxes = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for partition in 0..workers {
            let (tx, rx) = bounded(capacity);
            let correlator = EventCorrelator::new(config, Arc::clone(&change_index));
            match worker::spawn(partition, correlator, context.clone(), rx) {
                Ok(handle) => {
                    inboxes.push(tx);
                    handles.push(handle);
                }
                Err(e) => {
                    stop(&inboxes, &mut handles);
                    return Err(e);
                }
            }
        }
        tracing::info!(workers, capacity, "runtime started");

        let promotion = PromotionPipeline::new(
            config,
            PromotionStores::sqlite(Arc::clone(&engine)),
            Arc::clone(&rewards),
            dispatcher.clone(),
            sink,
        );
        Ok(Self {
            engine,
            router: PartitionRouter::new(workers, REMEMBERED_FINDINGS_PER_WORKER * workers as u64),
            inboxes,
            handles,
            promotion,
            run_lock: Mutex::new(()),
            rewards,
            dispatcher,
            cancel: CancellationToken::new(),
        })
    }

    /// Parse and submit one JSON envelope. An envelope that fails to parse
    /// or validate is rejected with its error code.
    pub fn submit_json(&self, json: &str) -> OperationOutcome<BatchReceipt> {
        let envelope = match EventEnvelope::from_json(json) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.reject(None, None, &e);
                return OperationOutcome::failed(&e);
            }
        };
        let batch = self.submit_batch(vec![envelope]);
        match batch.receipts.first().and_then(|r| r.error_code.clone()) {
            Some(code) => OperationOutcome {
                success: false,
                error_message: batch.receipts.first().and_then(|r| r.error_message.clone()),
                error_code: Some(code),
                value: Some(batch),
            },
            None => OperationOutcome::ok(batch),
        }
    }

    /// Decode, route and process a batch, returning once every event has
    /// been handled by its worker.
    pub fn submit_batch(&self, envelopes: Vec<EventEnvelope>) -> BatchReceipt {
        let mut batch = BatchReceipt {
            receipts: vec![EventReceipt::default(); envelopes.len()],
            ..Default::default()
        };
        let mut decoded: Vec<(usize, EventEnvelope, InboundEvent)> = Vec::with_capacity(envelopes.len());
        for (slot, envelope) in envelopes.into_iter().enumerate() {
            match envelope.decode() {
                Ok(event) => decoded.push((slot, envelope, event)),
                Err(e) => {
                    self.reject(Some(envelope.event_id), Some(&envelope.correlation_id), &e);
                    batch.receipts[slot] = EventReceipt {
                        event_id: Some(envelope.event_id),
                        error_code: Some(e.error_code().to_string()),
                        error_message: Some(e.to_string()),
                        ..Default::default()
                    };
                    batch.rejected += 1;
                }
            }
        }
        self.router.learn(decoded.iter().map(|(_, _, event)| event));

        let (ack_tx, ack_rx) = unbounded();
        let mut pending = 0usize;
        for (slot, envelope, event) in decoded {
            let partition = self.router.route(&event);
            let event_id = envelope.event_id;
            let message = WorkerMessage::Event {
                envelope,
                event,
                ack: ack_tx.clone(),
                slot,
            };
            if self.inboxes[partition].send(message).is_err() {
                let e = PipelineError::Worker(format!("worker {partition} is not running"));
                tracing::error!(partition, %event_id, "event not delivered to its worker");
                batch.receipts[slot] = EventReceipt::failed(Some(event_id), partition, &e);
                continue;
            }
            pending += 1;
        }
        drop(ack_tx);

        for _ in 0..pending {
            match ack_rx.recv() {
                Ok((slot, receipt)) => batch.receipts[slot] = receipt,
                Err(_) => {
                    tracing::error!(pending, "workers stopped before acknowledging the batch");
                    break;
                }
            }
        }

        batch.pairs_created = batch.receipts.iter().filter(|r| r.pair_id.is_some()).count();
        batch.pairs_promoted = batch.receipts.iter().filter(|r| r.promoted).count();
        record_metric(metrics::PAIRS_CREATED, batch.pairs_created as f64);
        record_metric(metrics::PAIRS_PROMOTED, batch.pairs_promoted as f64);
        batch
    }

    /// Run the promotion pipeline over the whole evidence window.
    pub fn run_promotion(&self, trigger: &RunTrigger) -> Result<PipelineResult<PromotionReport>, PipelineError> {
        let _running = self
            .run_lock
            .lock()
            .map_err(|_| PipelineError::Worker("promotion lock poisoned".to_string()))?;
        self.promotion.run(trigger, &self.cancel)
    }

    /// Run the promotion pipeline only when promoted pairs arrived since
    /// the last run.
    pub fn promote_pending(&self, trigger: &RunTrigger) -> Result<PipelineResult<PromotionReport>, PipelineError> {
        let _running = self
            .run_lock
            .lock()
            .map_err(|_| PipelineError::Worker("promotion lock poisoned".to_string()))?;
        self.promotion.run_if_pending(trigger, &self.cancel)
    }

    pub fn repromote(
        &self,
        signature: &str,
        domain: &str,
        trigger: &RunTrigger,
    ) -> Result<Option<LearnedPattern>, PipelineError> {
        let _running = self
            .run_lock
            .lock()
            .map_err(|_| PipelineError::Worker("promotion lock poisoned".to_string()))?;
        self.promotion.repromote(signature, domain, trigger)
    }

    /// Feed back what happened to a pair's fix after it was paired.
    pub fn record_fix_outcome(&self, pair_id: &str, outcome: FixOutcome) {
        tracing::debug!(pair_id, ?outcome, "fix outcome recorded");
        self.rewards.record_pair(pair_id, outcome);
    }

    /// Wrap a review host so each `(pr, finding set)` is published once.
    pub fn publisher(&self, inner: Arc<dyn ReviewPublisher>) -> IdempotentPublisher {
        IdempotentPublisher::new(inner, self.engine.clone())
    }

    pub fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }

    pub fn rewards(&self) -> &Arc<RewardAttribution> {
        &self.rewards
    }

    /// Cancels in-flight and future promotion runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn workers(&self) -> usize {
        self.inboxes.len()
    }

    /// Stop every worker after it drains what was already queued.
    pub fn shutdown(mut self) {
        self.cancel.cancel();
        stop(&self.inboxes, &mut self.handles);
    }

    fn reject(&self, event_id: Option<Uuid>, correlation_id: Option<&str>, error: &EventError) {
        tracing::warn!(
            event_id = ?event_id,
            correlation_id = ?correlation_id,
            error_code = error.error_code(),
            error = %error,
            "inbound event rejected"
        );
        self.dispatcher.emit_event_rejected(&EventRejectedEvent {
            event_id,
            correlation_id: correlation_id.map(str::to_string),
            error_code: error.error_code().to_string(),
            message: error.to_string(),
        });
    }
}

impl Drop for FixloopRuntime {
    fn drop(&mut self) {
        stop(&self.inboxes, &mut self.handles);
    }
}

impl std::fmt::Debug for FixloopRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixloopRuntime")
            .field("router", &self.router)
            .field("running_workers", &self.handles.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn stop(inboxes: &[Sender<WorkerMessage>], handles: &mut Vec<JoinHandle<()>>) {
    if handles.is_empty() {
        return;
    }
    for inbox in inboxes {
        let _ = inbox.send(WorkerMessage::Shutdown);
    }
    for handle in handles.drain(..) {
        if handle.join().is_err() {
            tracing::error!("worker thread panicked during shutdown");
        }
    }
    tracing::info!("runtime stopped");
}
