//! Promotion run: promoted pairs in, lifecycle transitions and validated
//! codemods out.
//!
//! A run re-clusters every promoted pair inside the evidence window, scores
//! each cluster, and evaluates the lineage its signature names. Current
//! provisional and validated lineages that no cluster named are then
//! checked for demotion against their stored members. Everything before
//! persistence is pure; cancellation is checked before the first write and
//! between patterns. Each version write is one transaction.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fixloop_analysis::aggregation::{AggregationPipeline, PatternCluster};
use fixloop_analysis::codemod::{CodemodGenerator, GeneratedCodemod, ReplayValidator};
use fixloop_analysis::features::FeatureExtractor;
use fixloop_analysis::promotion::{
    LifecycleDecision, LifecycleEvidence, LifecycleStateMachine, PatternScore, PatternScorer,
    PatternSignature, TransitionReason,
};
use fixloop_core::config::FixloopConfig;
use fixloop_core::errors::{PipelineError, PipelineResult};
use fixloop_core::events::{
    CodemodValidatedEvent, EventDispatcher, EventEnvelope, EventType, NearThresholdEvent,
    PatternDemotedEvent, PatternPromotedEvent,
};
use fixloop_core::models::{
    CodemodStatus, DecisionRecord, DecisionType, FindingFixPair, LearnedPattern, PatternState,
};
use fixloop_core::tracing::metrics;
use fixloop_core::traits::{
    Cancellable, CancellationToken, CodemodStore, DecisionStore, OutboundSink, PairStore,
    PatternRepository, WatermarkStore,
};
use fixloop_storage::{SqlitePatternRepository, StorageEngine};

use crate::record_metric;
use crate::rewards::{lineage_key, RewardAttribution};

/// Watermark name of the promotion run.
pub const PROMOTION_WATERMARK: &str = "promotion";

/// Clusters smaller than this are not patterns.
const MIN_PATTERN_MEMBERS: u32 = 2;

/// The stores a run reads and writes, each behind its own trait.
#[derive(Clone)]
pub struct PromotionStores {
    pub patterns: Arc<dyn PatternRepository>,
    pub pairs: Arc<dyn PairStore>,
    pub decisions: Arc<dyn DecisionStore>,
    pub codemods: Arc<dyn CodemodStore>,
    pub watermarks: Arc<dyn WatermarkStore>,
}

impl PromotionStores {
    /// Every store backed by one SQLite engine.
    pub fn sqlite(engine: Arc<StorageEngine>) -> Self {
        Self {
            patterns: Arc::new(SqlitePatternRepository::new(Arc::clone(&engine))),
            pairs: engine.clone(),
            decisions: engine.clone(),
            codemods: engine.clone(),
            watermarks: engine,
        }
    }
}

/// Why a run happened, carried onto its decisions and outbound events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTrigger {
    pub correlation_id: String,
    pub causation_id: Option<Uuid>,
}

impl RunTrigger {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            causation_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSummary {
    pub pattern_id: String,
    pub signature: String,
    pub domain: String,
    pub version: u32,
    pub from: PatternState,
    pub to: PatternState,
    pub reason: TransitionReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodemodSummary {
    pub codemod_id: String,
    pub pattern_id: String,
    pub status: CodemodStatus,
    pub cases_passed: u32,
    pub cases_failed: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromotionReport {
    pub run_id: String,
    /// No promoted pair arrived since the last run.
    pub skipped: bool,
    pub pairs_considered: usize,
    pub clusters: usize,
    pub near_threshold_warnings: usize,
    pub patterns_created: usize,
    pub transitions: Vec<TransitionSummary>,
    pub codemods: Vec<CodemodSummary>,
}

struct ClusterPlan {
    cluster_id: String,
    signature: String,
    domain: String,
    pattern_type: String,
    score: PatternScore,
    member_ids: Vec<String>,
}

struct RunContext<'a> {
    run_id: String,
    trigger: &'a RunTrigger,
    now: DateTime<Utc>,
    pairs: FxHashMap<&'a str, &'a FindingFixPair>,
}

pub struct PromotionPipeline {
    config: FixloopConfig,
    stores: PromotionStores,
    extractor: FeatureExtractor,
    scorer: PatternScorer,
    lifecycle: LifecycleStateMachine,
    generator: CodemodGenerator,
    replay: ReplayValidator,
    rewards: Arc<RewardAttribution>,
    dispatcher: EventDispatcher,
    sink: Arc<dyn OutboundSink>,
    source: String,
    /// Negative outcome count the last demotion sweep saw.
    swept_outcomes: AtomicU64,
}

impl PromotionPipeline {
    pub fn new(
        config: &FixloopConfig,
        stores: PromotionStores,
        rewards: Arc<RewardAttribution>,
        dispatcher: EventDispatcher,
        sink: Arc<dyn OutboundSink>,
    ) -> Self {
        Self {
            config: config.clone(),
            stores,
            extractor: FeatureExtractor::new(),
            scorer: PatternScorer::new(&config.lifecycle),
            lifecycle: LifecycleStateMachine::new(&config.lifecycle),
            generator: CodemodGenerator::new(),
            replay: ReplayValidator::new(&config.codemod),
            rewards,
            dispatcher,
            sink,
            source: config.runtime.effective_source_name(),
            swept_outcomes: AtomicU64::new(0),
        }
    }

    /// Run only when a promoted pair arrived after the watermark, or a
    /// negative fix outcome arrived since the last demotion sweep.
    pub fn run_if_pending(
        &self,
        trigger: &RunTrigger,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult<PromotionReport>, PipelineError> {
        let latest = self.stores.pairs.latest_promoted_pair_at()?;
        let mark = self.stores.watermarks.get_watermark(PROMOTION_WATERMARK)?;
        let new_pairs = match (latest, mark) {
            (None, _) => false,
            (Some(latest), Some(mark)) => latest > mark,
            (Some(_), None) => true,
        };
        let new_outcomes =
            self.rewards.negative_outcomes() > self.swept_outcomes.load(Ordering::Relaxed);
        if !new_pairs && !new_outcomes {
            tracing::debug!(correlation_id = %trigger.correlation_id, "no new evidence since the last run");
            return Ok(PipelineResult::new(PromotionReport {
                skipped: true,
                ..Default::default()
            }));
        }
        self.run(trigger, cancel)
    }

    pub fn run(
        &self,
        trigger: &RunTrigger,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult<PromotionReport>, PipelineError> {
        let started = Instant::now();
        let now = Utc::now();
        let run_id = format!("run-{}", Uuid::new_v4());
        let span = tracing::info_span!(
            "promotion_run",
            %run_id,
            correlation_id = %trigger.correlation_id
        );
        let _guard = span.enter();

        let window = Duration::days(i64::from(self.config.storage.effective_evidence_window_days()));
        let pairs = self.stores.pairs.list_promoted_pairs_since(now - window)?;
        let outcomes_seen = self.rewards.negative_outcomes();
        let mut result = PipelineResult::new(PromotionReport {
            run_id: run_id.clone(),
            pairs_considered: pairs.len(),
            ..Default::default()
        });
        ensure_live(cancel)?;

        let ctx = RunContext {
            run_id,
            trigger,
            now,
            pairs: pairs.iter().map(|p| (p.pair_id.as_str(), p)).collect(),
        };
        let evaluated = if pairs.is_empty() {
            tracing::info!("no promoted pairs in the evidence window");
            FxHashSet::default()
        } else {
            self.promote_clusters(&pairs, &ctx, cancel, &mut result)?
        };
        if !cancel.is_cancelled() {
            self.sweep_demotions(&evaluated, &ctx, cancel, &mut result)?;
            self.swept_outcomes.store(outcomes_seen, Ordering::Relaxed);
        }

        if !cancel.is_cancelled() {
            if let Some(latest) = pairs.iter().map(|p| p.created_at).max() {
                self.stores.watermarks.set_watermark(PROMOTION_WATERMARK, latest)?;
            }
        }
        record_metric(metrics::TRANSITIONS_APPLIED, result.data.transitions.len() as f64);
        record_metric(metrics::RUN_DURATION, started.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            pairs = result.data.pairs_considered,
            clusters = result.data.clusters,
            created = result.data.patterns_created,
            transitions = result.data.transitions.len(),
            codemods = result.data.codemods.len(),
            errors = result.error_count(),
            "promotion run complete"
        );
        Ok(result)
    }

    /// Cluster the window's pairs and evaluate each cluster's lineage.
    /// Returns the lineage keys the clusters named.
    fn promote_clusters(
        &self,
        pairs: &[FindingFixPair],
        ctx: &RunContext<'_>,
        cancel: &CancellationToken,
        result: &mut PipelineResult<PromotionReport>,
    ) -> Result<FxHashSet<String>, PipelineError> {
        let records = self.extractor.extract_pairs(pairs);
        let aggregation = AggregationPipeline::new(&self.config.clustering).run(&records, cancel)?;
        record_metric(metrics::CLUSTER_COUNT, aggregation.clusters.len() as f64);
        record_metric(metrics::NEAR_THRESHOLD_WARNINGS, aggregation.warnings.len() as f64);
        record_metric(metrics::CACHE_HIT_RATE, aggregation.diagnostics.cache_hit_rate);
        for warning in &aggregation.warnings {
            self.dispatcher.emit_near_threshold(&NearThresholdEvent {
                cluster_a_id: warning.cluster_a_id.clone(),
                cluster_b_id: warning.cluster_b_id.clone(),
                similarity: warning.similarity,
                threshold: warning.threshold,
            });
        }
        result.data.clusters = aggregation.clusters.len();
        result.data.near_threshold_warnings = aggregation.warnings.len();

        let plans: Vec<ClusterPlan> = aggregation
            .clusters
            .iter()
            .filter(|c| c.member_count() >= MIN_PATTERN_MEMBERS)
            .map(|c| self.plan(c))
            .collect();
        ensure_live(cancel)?;

        let mut evaluated = FxHashSet::default();
        for plan in &plans {
            if cancel.is_cancelled() {
                tracing::warn!("run cancelled between patterns");
                result.add_error(PipelineError::Cancelled);
                break;
            }
            evaluated.insert(lineage_key(&plan.signature, &plan.domain));
            if let Err(e) = self.apply(plan, ctx, result) {
                tracing::error!(
                    cluster_id = %plan.cluster_id,
                    signature = %plan.signature,
                    error = %e,
                    "pattern evaluation failed"
                );
                result.add_error(e);
            }
        }
        Ok(evaluated)
    }

    /// Demote current provisional and validated lineages that this run's
    /// clusters did not name, on the outcomes of their stored members.
    fn sweep_demotions(
        &self,
        evaluated: &FxHashSet<String>,
        ctx: &RunContext<'_>,
        cancel: &CancellationToken,
        result: &mut PipelineResult<PromotionReport>,
    ) -> Result<(), PipelineError> {
        let alpha = self.config.lifecycle.effective_reward_ema_alpha();
        for current in self.stores.patterns.list_demotion_candidates(None)? {
            let key = lineage_key(&current.signature, &current.domain);
            if evaluated.contains(&key) {
                continue;
            }
            if cancel.is_cancelled() {
                tracing::warn!("run cancelled during demotion sweep");
                result.add_error(PipelineError::Cancelled);
                break;
            }
            let evidence = self.rewards.evidence(&key, &current.member_ids, alpha);
            let Some(reason) = self.lifecycle.demotion_for(&current, &evidence) else {
                continue;
            };

            let mut next = LifecycleStateMachine::deprecated_version(&current, ctx.now);
            next.source_run_id = Some(ctx.run_id.clone());
            next.correlation_id = Some(ctx.trigger.correlation_id.clone());
            let mut record = base_decision(
                DecisionType::PatternDemoted,
                &next,
                vec![current.pattern_id.clone(), next.pattern_id.clone()],
                ctx.now,
            );
            record.reproducibility_snapshot.extend([
                ("run_id".to_string(), ctx.run_id.clone()),
                ("member_ids".to_string(), current.member_ids.join(",")),
                ("clustered".to_string(), "false".to_string()),
            ]);
            if let Err(e) = self.commit_transition(&current, next, reason, &evidence, record, ctx, result) {
                tracing::error!(signature = %current.signature, error = %e, "demotion failed");
                result.add_error(e);
            }
        }
        Ok(())
    }

    /// Bring a deprecated lineage back as a new candidate version.
    /// `None` when the lineage is unknown or not deprecated.
    pub fn repromote(
        &self,
        signature: &str,
        domain: &str,
        trigger: &RunTrigger,
    ) -> Result<Option<LearnedPattern>, PipelineError> {
        let Some(latest) = self.stores.patterns.get_latest_by_lineage(signature, domain)? else {
            return Ok(None);
        };
        let now = Utc::now();
        let Some(mut next) = LifecycleStateMachine::repromote(&latest, now) else {
            return Ok(None);
        };
        next.correlation_id = Some(trigger.correlation_id.clone());
        if !self.stores.patterns.promote_version(&next)? {
            return Ok(None);
        }

        let mut record = base_decision(
            DecisionType::PatternPromoted,
            &next,
            vec![latest.pattern_id.clone(), next.pattern_id.clone()],
            now,
        );
        record.agent_rationale = Some(format!(
            "{} -> {}: {}",
            latest.state,
            next.state,
            TransitionReason::Repromotion
        ));
        self.stores
            .decisions
            .store_decision(&record, Some(&trigger.correlation_id))?;

        let event = PatternPromotedEvent {
            pattern_id: next.pattern_id.clone(),
            signature: next.signature.clone(),
            domain: next.domain.clone(),
            version: next.version,
            from_state: latest.state,
            to_state: next.state,
            confidence: next.confidence,
        };
        let envelope = EventEnvelope::outbound(
            EventType::PatternPromoted,
            &event,
            &trigger.correlation_id,
            trigger.causation_id,
            &self.source,
        )?;
        self.sink.publish(&envelope)?;
        self.dispatcher.emit_pattern_promoted(&event);
        tracing::info!(pattern_id = %next.pattern_id, version = next.version, "lineage repromoted");
        Ok(Some(next))
    }

    fn plan(&self, cluster: &PatternCluster) -> ClusterPlan {
        let signature = PatternSignature::generate(
            cluster.pattern_type(),
            &cluster.consensus_keywords(),
            &cluster.consensus_indicators(),
        );
        ClusterPlan {
            cluster_id: cluster.cluster_id().to_string(),
            signature: signature.render(),
            domain: cluster.domain().to_string(),
            pattern_type: cluster.pattern_type().to_string(),
            score: self.scorer.score(cluster),
            member_ids: cluster.member_ids().to_vec(),
        }
    }

    fn apply(
        &self,
        plan: &ClusterPlan,
        ctx: &RunContext<'_>,
        result: &mut PipelineResult<PromotionReport>,
    ) -> Result<(), PipelineError> {
        let current = match self
            .stores
            .patterns
            .get_latest_by_lineage(&plan.signature, &plan.domain)?
        {
            Some(latest) if latest.state.is_terminal() => {
                tracing::debug!(signature = %plan.signature, "lineage deprecated, awaiting repromotion");
                return Ok(());
            }
            Some(latest) => latest,
            None => {
                let candidate = self.candidate(plan, ctx);
                if self.stores.patterns.store_pattern(&candidate)? {
                    result.data.patterns_created += 1;
                    let mut record = self.decision_for(
                        DecisionType::PatternCreated,
                        &candidate,
                        plan,
                        ctx,
                        vec![candidate.pattern_id.clone()],
                    );
                    record.agent_rationale = Some(format!(
                        "new lineage from cluster {} with {} members",
                        plan.cluster_id, plan.score.member_count
                    ));
                    self.stores
                        .decisions
                        .store_decision(&record, Some(&ctx.trigger.correlation_id))?;
                }
                candidate
            }
        };

        let evidence = self.rewards.evidence(
            &lineage_key(&plan.signature, &plan.domain),
            &plan.member_ids,
            self.config.lifecycle.effective_reward_ema_alpha(),
        );
        let (to, reason, sustained_runs) =
            match self.lifecycle.evaluate(&current, &plan.score, &evidence) {
                LifecycleDecision::Unchanged { sustained_runs } => {
                    let refreshed = LearnedPattern {
                        confidence: plan.score.confidence,
                        components: plan.score.components,
                        member_count: plan.score.member_count,
                        sustained_runs,
                        member_ids: plan.member_ids.clone(),
                        ..current
                    };
                    self.stores.patterns.record_evaluation(&refreshed)?;
                    return Ok(());
                }
                LifecycleDecision::Transition {
                    to,
                    reason,
                    sustained_runs,
                    ..
                } => (to, reason, sustained_runs),
            };

        let mut next = LifecycleStateMachine::next_version(
            &current,
            to,
            &plan.score,
            sustained_runs,
            plan.member_ids.clone(),
            ctx.now,
        );
        next.source_run_id = Some(ctx.run_id.clone());
        next.correlation_id = Some(ctx.trigger.correlation_id.clone());
        let decision_type = if reason.is_demotion() {
            DecisionType::PatternDemoted
        } else {
            DecisionType::PatternPromoted
        };
        let record = self.decision_for(
            decision_type,
            &next,
            plan,
            ctx,
            vec![current.pattern_id.clone(), next.pattern_id.clone()],
        );
        self.commit_transition(&current, next, reason, &evidence, record, ctx, result)
    }

    /// Write `next` as the lineage's current version, then record the
    /// decision and announce the transition.
    #[allow(clippy::too_many_arguments)]
    fn commit_transition(
        &self,
        current: &LearnedPattern,
        next: LearnedPattern,
        reason: TransitionReason,
        evidence: &LifecycleEvidence,
        mut record: DecisionRecord,
        ctx: &RunContext<'_>,
        result: &mut PipelineResult<PromotionReport>,
    ) -> Result<(), PipelineError> {
        let (from, to) = (current.state, next.state);
        let started = Instant::now();
        if !self.stores.patterns.promote_version(&next)? {
            tracing::debug!(pattern_id = %next.pattern_id, "version already written");
            return Ok(());
        }
        record_metric(metrics::PERSIST_TIME, started.elapsed().as_secs_f64() * 1000.0);

        record.agent_rationale = Some(format!("{from} -> {to}: {reason}"));
        record
            .reproducibility_snapshot
            .insert("reward_average".into(), format!("{:.4}", evidence.reward.average));
        record
            .reproducibility_snapshot
            .insert("reward_violations".into(), evidence.reward.violations.to_string());
        self.stores
            .decisions
            .store_decision(&record, Some(&ctx.trigger.correlation_id))?;

        tracing::info!(
            pattern_id = %next.pattern_id,
            signature = %next.signature,
            %from,
            %to,
            %reason,
            confidence = next.confidence,
            "pattern transition"
        );
        result.data.transitions.push(TransitionSummary {
            pattern_id: next.pattern_id.clone(),
            signature: next.signature.clone(),
            domain: next.domain.clone(),
            version: next.version,
            from,
            to,
            reason,
        });

        if reason.is_demotion() {
            self.rewards.retire(&lineage_key(&next.signature, &next.domain));
            let event = PatternDemotedEvent {
                pattern_id: next.pattern_id.clone(),
                signature: next.signature.clone(),
                domain: next.domain.clone(),
                version: next.version,
                from_state: from,
                reason: reason.name().to_string(),
            };
            self.announce(EventType::PatternDemoted, &event, ctx, result);
            self.dispatcher.emit_pattern_demoted(&event);
        } else {
            let event = PatternPromotedEvent {
                pattern_id: next.pattern_id.clone(),
                signature: next.signature.clone(),
                domain: next.domain.clone(),
                version: next.version,
                from_state: from,
                to_state: to,
                confidence: next.confidence,
            };
            self.announce(EventType::PatternPromoted, &event, ctx, result);
            self.dispatcher.emit_pattern_promoted(&event);
        }

        if to == PatternState::Validated {
            self.validate_codemod(&next, ctx, result)?;
        }
        Ok(())
    }

    fn validate_codemod(
        &self,
        pattern: &LearnedPattern,
        ctx: &RunContext<'_>,
        result: &mut PipelineResult<PromotionReport>,
    ) -> Result<(), PipelineError> {
        let evidence: Vec<FindingFixPair> = pattern
            .member_ids
            .iter()
            .filter_map(|id| ctx.pairs.get(id.as_str()).map(|p| (*p).clone()))
            .collect();
        let GeneratedCodemod {
            mut definition,
            anti_pattern,
            strategy,
        } = match self.generator.generate(pattern, &evidence) {
            Ok(generated) => generated,
            Err(e) => {
                tracing::info!(pattern_id = %pattern.pattern_id, error = %e, "no codemod for pattern");
                result.add_error(e.into());
                return Ok(());
            }
        };

        let cases = self.replay.cases_from_pairs(&evidence);
        let started = Instant::now();
        self.replay.validate_definition(&mut definition, &cases);
        record_metric(metrics::REPLAY_TIME, started.elapsed().as_secs_f64() * 1000.0);
        self.stores.codemods.store_codemod(&definition)?;

        let (cases_passed, cases_failed) = definition
            .replay_result
            .as_ref()
            .map(|r| (r.cases_passed, r.cases_failed))
            .unwrap_or((0, 0));
        let mut record = base_decision(
            DecisionType::CodemodValidation,
            pattern,
            vec![definition.codemod_id.clone()],
            ctx.now,
        );
        record.decision_id = decision_id(DecisionType::CodemodValidation, &definition.codemod_id);
        record.selected_candidate = definition.codemod_id.clone();
        record.constraints_applied = vec![
            "static_check".to_string(),
            "replay_cases>0".to_string(),
            "all_replay_cases_pass".to_string(),
        ];
        record.scoring_breakdown = BTreeMap::from([
            ("cases_passed".to_string(), f64::from(cases_passed)),
            ("cases_failed".to_string(), f64::from(cases_failed)),
        ]);
        record.agent_rationale = Some(format!("{strategy:?} codemod {}", definition.status));
        record.reproducibility_snapshot.extend([
            ("run_id".to_string(), ctx.run_id.clone()),
            ("transform_signature".to_string(), definition.transform_signature.clone()),
            ("status".to_string(), definition.status.to_string()),
            (
                "case_ids".to_string(),
                cases
                    .iter()
                    .map(|c| c.case_id.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        ]);
        self.stores
            .decisions
            .store_decision(&record, Some(&ctx.trigger.correlation_id))?;

        result.data.codemods.push(CodemodSummary {
            codemod_id: definition.codemod_id.clone(),
            pattern_id: pattern.pattern_id.clone(),
            status: definition.status,
            cases_passed,
            cases_failed,
        });

        if definition.is_exposable() {
            self.rewards
                .watch(&lineage_key(&pattern.signature, &pattern.domain), anti_pattern);
            let event = CodemodValidatedEvent {
                codemod_id: definition.codemod_id.clone(),
                pattern_id: pattern.pattern_id.clone(),
                rule_id: definition.rule_id.clone(),
                transform_signature: definition.transform_signature.clone(),
                cases_passed,
            };
            self.announce(EventType::CodemodValidated, &event, ctx, result);
            self.dispatcher.emit_codemod_validated(&event);
        }
        Ok(())
    }

    fn candidate(&self, plan: &ClusterPlan, ctx: &RunContext<'_>) -> LearnedPattern {
        LearnedPattern {
            pattern_id: LearnedPattern::derive_id(&plan.signature, &plan.domain, 1),
            signature: plan.signature.clone(),
            domain: plan.domain.clone(),
            version: 1,
            pattern_type: plan.pattern_type.clone(),
            confidence: plan.score.confidence,
            components: plan.score.components,
            state: PatternState::Candidate,
            is_current: true,
            member_count: plan.score.member_count,
            sustained_runs: 0,
            member_ids: plan.member_ids.clone(),
            stored_at: ctx.now,
            source_run_id: Some(ctx.run_id.clone()),
            correlation_id: Some(ctx.trigger.correlation_id.clone()),
        }
    }

    fn decision_for(
        &self,
        decision_type: DecisionType,
        pattern: &LearnedPattern,
        plan: &ClusterPlan,
        ctx: &RunContext<'_>,
        candidates: Vec<String>,
    ) -> DecisionRecord {
        let lifecycle = &self.config.lifecycle;
        let mut record = base_decision(decision_type, pattern, candidates, ctx.now);
        record.constraints_applied = vec![
            format!("provisional_threshold={:.2}", lifecycle.effective_provisional_threshold()),
            format!("validated_threshold={:.2}", lifecycle.effective_validated_threshold()),
            format!("min_members={}", lifecycle.effective_min_members()),
            format!("sustained_runs_required={}", lifecycle.effective_sustained_runs_required()),
        ];
        record.scoring_breakdown = BTreeMap::from([
            ("confidence".to_string(), plan.score.confidence),
            ("label_agreement".to_string(), plan.score.components.label_agreement),
            ("cluster_cohesion".to_string(), plan.score.components.cluster_cohesion),
            ("frequency_factor".to_string(), plan.score.components.frequency_factor),
        ]);
        record.reproducibility_snapshot.extend([
            ("run_id".to_string(), ctx.run_id.clone()),
            ("cluster_id".to_string(), plan.cluster_id.clone()),
            ("dominant_component".to_string(), plan.score.dominant.to_string()),
            ("member_ids".to_string(), plan.member_ids.join(",")),
        ]);
        record
    }

    fn announce<T: Serialize>(
        &self,
        event_type: EventType,
        payload: &T,
        ctx: &RunContext<'_>,
        result: &mut PipelineResult<PromotionReport>,
    ) {
        let sent = EventEnvelope::outbound(
            event_type,
            payload,
            &ctx.trigger.correlation_id,
            ctx.trigger.causation_id,
            &self.source,
        )
        .map_err(PipelineError::from)
        .and_then(|envelope| self.sink.publish(&envelope).map_err(PipelineError::from));
        if let Err(e) = sent {
            tracing::warn!(event_type = %event_type, error = %e, "outbound event not delivered");
            result.add_error(e);
        }
    }
}

impl std::fmt::Debug for PromotionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromotionPipeline")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

/// Decision ids are derived from what was decided, so a re-run that makes
/// the same decision stores nothing new.
fn decision_id(decision_type: DecisionType, subject: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(decision_type.name().as_bytes());
    hasher.update(b"\0");
    hasher.update(subject.as_bytes());
    format!("dec-{}", &hasher.finalize().to_hex()[..32])
}

fn base_decision(
    decision_type: DecisionType,
    pattern: &LearnedPattern,
    candidates: Vec<String>,
    now: DateTime<Utc>,
) -> DecisionRecord {
    DecisionRecord {
        decision_id: decision_id(decision_type, &pattern.pattern_id),
        decision_type,
        timestamp: now,
        candidates_considered: candidates,
        constraints_applied: Vec::new(),
        scoring_breakdown: BTreeMap::new(),
        tie_breaker: None,
        selected_candidate: pattern.pattern_id.clone(),
        agent_rationale: None,
        reproducibility_snapshot: BTreeMap::from([
            ("signature".to_string(), pattern.signature.clone()),
            ("domain".to_string(), pattern.domain.clone()),
            ("version".to_string(), pattern.version.to_string()),
            ("state".to_string(), pattern.state.to_string()),
            ("sustained_runs".to_string(), pattern.sustained_runs.to_string()),
        ]),
        stored_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_ids_are_stable_per_subject_and_type() {
        let a = decision_id(DecisionType::PatternPromoted, "pat-1");
        assert_eq!(a, decision_id(DecisionType::PatternPromoted, "pat-1"));
        assert_ne!(a, decision_id(DecisionType::PatternDemoted, "pat-1"));
        assert_ne!(a, decision_id(DecisionType::PatternPromoted, "pat-2"));
        assert!(a.starts_with("dec-"));
    }
}
