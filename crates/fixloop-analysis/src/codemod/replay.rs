//! Replay validation: static check, then every recorded case run in a
//! sandbox thread with a wall-clock deadline and an output budget.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::RecvTimeoutError;

use fixloop_core::config::CodemodConfig;
use fixloop_core::errors::{CodemodError, SandboxError};
use fixloop_core::models::{CodemodDefinition, CodemodStatus, FindingFixPair, ReplayResult};

use super::dsl::CompiledCodemod;
use crate::scoring::parse_hunks;

/// One historical `(input, expected)` pair, identified by its pair id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayCase {
    pub case_id: String,
    pub input_source: String,
    pub expected_output: String,
}

impl ReplayCase {
    /// Rebuild a case from a pair's hunks: context and removed lines in,
    /// context and added lines out. `None` when the pair has no change.
    pub fn from_pair(pair: &FindingFixPair) -> Option<Self> {
        let hunks = parse_hunks(&pair.diff_hunks);
        if !hunks.iter().any(|h| h.has_changes()) {
            return None;
        }
        let input_source: String = hunks.iter().map(|h| h.before_text()).collect();
        let expected_output: String = hunks.iter().map(|h| h.after_text()).collect();
        Some(Self {
            case_id: pair.pair_id.clone(),
            input_source,
            expected_output,
        })
    }
}

/// Outcome of validating one codemod.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub status: CodemodStatus,
    /// `None` only for rejected codemods, which never reach replay.
    pub replay_result: Option<ReplayResult>,
    pub rejection: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReplayValidator {
    timeout: Duration,
    output_budget: usize,
    max_cases: usize,
}

impl ReplayValidator {
    pub fn new(config: &CodemodConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.effective_replay_timeout_ms()),
            output_budget: config.effective_output_budget_bytes(),
            max_cases: config.effective_max_replay_cases(),
        }
    }

    /// Cases for a set of evidence pairs, sorted by id and capped.
    pub fn cases_from_pairs(&self, pairs: &[FindingFixPair]) -> Vec<ReplayCase> {
        let mut cases: Vec<ReplayCase> = pairs.iter().filter_map(ReplayCase::from_pair).collect();
        cases.sort_by(|a, b| a.case_id.cmp(&b.case_id));
        cases.dedup_by(|a, b| a.case_id == b.case_id);
        cases.truncate(self.max_cases);
        cases
    }

    /// Static check then replay. A source that fails the static check is
    /// `rejected`; zero cases or any failing case is `failed`.
    pub fn validate(&self, codemod_source: &str, cases: &[ReplayCase]) -> ReplayOutcome {
        let compiled = match CompiledCodemod::compile(codemod_source) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                tracing::info!(error = %e, "codemod rejected by static check");
                return ReplayOutcome {
                    status: CodemodStatus::Rejected,
                    replay_result: None,
                    rejection: Some(e.to_string()),
                };
            }
        };

        let mut failing_case_ids = BTreeSet::new();
        let mut failure_details = Vec::new();
        let mut cases_passed = 0u32;
        for case in cases {
            match self.run_case(&compiled, &case.input_source) {
                Ok(output) if output == case.expected_output => cases_passed += 1,
                Ok(_) => {
                    failing_case_ids.insert(case.case_id.clone());
                    failure_details.push(format!("{}: output mismatch", case.case_id));
                }
                Err(e) => {
                    failing_case_ids.insert(case.case_id.clone());
                    failure_details.push(format!("{}: {e}", case.case_id));
                }
            }
        }
        let cases_failed = failing_case_ids.len() as u32;
        let passed = !cases.is_empty() && cases_failed == 0;
        if cases.is_empty() {
            failure_details.push("no replay cases".to_string());
        }
        let status = if passed {
            CodemodStatus::Validated
        } else {
            CodemodStatus::Failed
        };
        tracing::info!(
            status = status.name(),
            cases_passed,
            cases_failed,
            "codemod replay complete"
        );
        ReplayOutcome {
            status,
            replay_result: Some(ReplayResult {
                passed,
                cases_passed,
                cases_failed,
                failing_case_ids,
                failure_details,
                validated_at: Utc::now(),
            }),
            rejection: None,
        }
    }

    /// Validate a generated definition in place.
    pub fn validate_definition(&self, definition: &mut CodemodDefinition, cases: &[ReplayCase]) {
        let outcome = self.validate(&definition.codemod_source, cases);
        definition.status = outcome.status;
        definition.replay_result = outcome.replay_result;
    }

    fn run_case(&self, codemod: &Arc<CompiledCodemod>, input: &str) -> Result<String, SandboxError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_codemod = Arc::clone(codemod);
        let worker_cancel = Arc::clone(&cancel);
        let input = input.to_string();
        let budget = self.output_budget;

        thread::Builder::new()
            .name("fixloop-replay".into())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    worker_codemod.apply(&input, &worker_cancel, budget)
                }))
                .unwrap_or_else(|payload| Err(SandboxError::Panicked(panic_message(&payload))));
                let _ = tx.send(result);
            })
            .map_err(|e| SandboxError::Execution(format!("sandbox spawn failed: {e}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Relaxed);
                Err(SandboxError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(SandboxError::Panicked("sandbox thread exited without a result".into()))
            }
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Static check only, for callers that need the error.
pub fn static_check(codemod_source: &str) -> Result<(), CodemodError> {
    CompiledCodemod::compile(codemod_source).map(|_| ())
}
