//! Event correlator: folds the finding/fix/resolution stream of one
//! partition into scored pairs.
//!
//! All events of a finding must reach the same correlator in arrival
//! order; the runtime guarantees this by partitioning on the repo.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Duration;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fixloop_core::config::FixloopConfig;
use fixloop_core::events::InboundEvent;
use fixloop_core::models::{
    FindingFixPair, FindingObserved, FindingResolved, FixApplied, PairingType,
};
use fixloop_core::traits::ChangeIndex;

use super::reintroduction::{ReintroductionSignal, ReintroductionTracker};
use crate::scoring::{
    is_anchored, is_formatter_batch, parse_hunks, ConfidenceScorer, ScoreResult, ScoringContext,
};

/// A pair together with the evidence and verdict that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPair {
    pub pair: FindingFixPair,
    pub fix_id: Uuid,
    pub context: ScoringContext,
    pub score: ScoreResult,
    pub offending_token: Option<String>,
}

/// What one ingested event produced.
#[derive(Debug, Clone, Default)]
pub struct CorrelationOutcome {
    pub pair: Option<ScoredPair>,
    pub reintroduction: Option<ReintroductionSignal>,
}

#[derive(Debug, Default)]
struct FindingState {
    observed: Option<FindingObserved>,
    fixes: Vec<FixApplied>,
    resolved: Option<FindingResolved>,
    last_emitted: Option<(String, u32)>,
}

#[derive(Debug, Clone)]
struct FixEvidence<'a> {
    fix: &'a FixApplied,
    pairing_type: PairingType,
    anchored: bool,
}

/// Per-partition correlation state.
pub struct EventCorrelator {
    scorer: ConfidenceScorer,
    change_index: Arc<dyn ChangeIndex>,
    temporal_window: Duration,
    formatter_batch_ratio: f64,
    config_file_names: FxHashSet<String>,
    findings: FxHashMap<Uuid, FindingState>,
    reintroductions: ReintroductionTracker,
    observed_count: u64,
}

impl EventCorrelator {
    pub fn new(config: &FixloopConfig, change_index: Arc<dyn ChangeIndex>) -> Self {
        Self {
            scorer: ConfidenceScorer::new(&config.scoring),
            change_index,
            temporal_window: Duration::hours(i64::from(
                config.correlation.effective_temporal_window_hours(),
            )),
            formatter_batch_ratio: config.scoring.effective_formatter_batch_ratio(),
            config_file_names: config
                .correlation
                .effective_config_file_names()
                .into_iter()
                .collect(),
            findings: FxHashMap::default(),
            reintroductions: ReintroductionTracker::new(
                config.correlation.effective_reintroduction_pr_window(),
            ),
            observed_count: 0,
        }
    }

    /// Fold one event into the partition state.
    pub fn ingest(&mut self, event: InboundEvent) -> CorrelationOutcome {
        let finding_id = event.finding_id();
        let mut outcome = CorrelationOutcome::default();
        match event {
            InboundEvent::FindingObserved(observed) => {
                let state = self.findings.entry(finding_id).or_default();
                if state.observed.is_some() {
                    tracing::debug!(%finding_id, "duplicate observation ignored");
                    return outcome;
                }
                self.observed_count += 1;
                if let Some(ordinal) = self.change_index.pr_ordinal(&observed.repo, &observed.pr_id)
                {
                    outcome.reintroduction = self.reintroductions.check(&observed, ordinal);
                    if let Some(signal) = &outcome.reintroduction {
                        tracing::info!(
                            %finding_id,
                            rule_id = %signal.rule_id,
                            original_pair_id = %signal.original_pair_id,
                            "finding reintroduced"
                        );
                    }
                }
                state.observed = Some(observed);
            }
            InboundEvent::FixApplied(fix) => {
                let state = self.findings.entry(finding_id).or_default();
                if state.fixes.iter().any(|f| f.fix_id == fix.fix_id) {
                    return outcome;
                }
                state.fixes.push(fix);
            }
            InboundEvent::FindingResolved(resolved) => {
                let state = self.findings.entry(finding_id).or_default();
                if state.resolved.is_some() {
                    return outcome;
                }
                state.resolved = Some(resolved);
            }
        }
        outcome.pair = self.evaluate(finding_id);
        outcome
    }

    /// Findings observed by this partition so far.
    pub fn observed_count(&self) -> u64 {
        self.observed_count
    }

    /// Findings still held in memory.
    pub fn tracked_findings(&self) -> usize {
        self.findings.len()
    }

    /// Drop findings that already produced a pair.
    pub fn evict_emitted(&mut self) -> usize {
        let before = self.findings.len();
        self.findings
            .retain(|_, s| !(s.resolved.is_some() && s.last_emitted.is_some()));
        before - self.findings.len()
    }

    fn evaluate(&mut self, finding_id: Uuid) -> Option<ScoredPair> {
        let state = self.findings.get(&finding_id)?;
        let observed = state.observed.as_ref()?;
        let resolved = state.resolved.as_ref()?;
        if state.fixes.is_empty() {
            return None;
        }

        let pr_commits = self
            .change_index
            .pr_commits(&observed.repo, &observed.pr_id)
            .unwrap_or_default();
        let mut candidates: Vec<FixEvidence<'_>> = state
            .fixes
            .iter()
            .map(|fix| FixEvidence {
                fix,
                pairing_type: self.pairing_type(observed, fix, resolved, &pr_commits),
                anchored: fix.file_path == observed.file_path
                    && (observed.line_start..=observed.last_line())
                        .any(|line| is_anchored(line, &fix.diff_hunks)),
            })
            .collect();
        candidates.sort_by(compare_evidence);
        let chosen = candidates.first()?;
        let fix = chosen.fix;

        let candidate_commit_count = state
            .fixes
            .iter()
            .map(|f| f.fix_commit_sha.as_str())
            .collect::<FxHashSet<_>>()
            .len() as u32;
        let token = offending_token(&observed.raw_message)
            .or_else(|| offending_token(&observed.normalized_message));
        let parsed = parse_hunks(&fix.diff_hunks);
        let diff_removes_token = token.as_deref().is_some_and(|t| {
            parsed
                .iter()
                .any(|h| h.removed().any(|line| contains_token(line, t)))
                && !parsed
                    .iter()
                    .any(|h| h.added().any(|line| contains_token(line, t)))
        });
        let touched_code = fix.file_path == observed.file_path && parsed.iter().any(|h| h.has_changes());
        let commit_files = self
            .change_index
            .commit_files(&observed.repo, &fix.fix_commit_sha);

        let context = ScoringContext {
            rule_id_matched: match &fix.rule_id {
                Some(rule) => *rule == observed.rule_id,
                None => fix.tool_autofix,
            },
            diff_removes_token,
            disappearance_confirmed: resolved.fix_commit_sha == fix.fix_commit_sha
                || resolved.resolved_at >= fix.applied_at,
            anchored_to_hunk: chosen.anchored,
            ambiguous_commits: !state
                .fixes
                .iter()
                .any(|f| f.fix_commit_sha == resolved.fix_commit_sha),
            disappears_without_modification: !touched_code,
            config_change_detected: self.is_config_file(&fix.file_path)
                || commit_files
                    .as_ref()
                    .is_some_and(|files| files.iter().any(|f| self.is_config_file(f))),
            candidate_commit_count,
            is_formatter_batch: match (
                commit_files.as_ref(),
                self.change_index.pr_files(&observed.repo, &observed.pr_id),
            ) {
                (Some(commit), Some(pr)) => {
                    is_formatter_batch(commit.len(), pr.len(), self.formatter_batch_ratio)
                }
                _ => false,
            },
        };
        let score = self.scorer.score(&context);

        let pair = FindingFixPair {
            pair_id: FindingFixPair::derive_id(&finding_id, &fix.fix_commit_sha),
            finding_id,
            fix_commit_sha: fix.fix_commit_sha.clone(),
            diff_hunks: fix.diff_hunks.clone(),
            confidence_score: score.confidence_score,
            disappearance_confirmed: context.disappearance_confirmed,
            pairing_type: chosen.pairing_type,
            created_at: resolved.resolved_at,
            repo: observed.repo.clone(),
            rule_id: observed.rule_id.clone(),
            file_path: observed.file_path.clone(),
            promoted: score.promoted,
        };
        let scored = ScoredPair {
            fix_id: fix.fix_id,
            pair,
            context,
            score,
            offending_token: token,
        };

        let emitted_key = (
            scored.pair.pair_id.clone(),
            (scored.score.confidence_score * 10_000.0).round() as u32,
        );
        let pr_ordinal = self
            .change_index
            .pr_ordinal(&observed.repo, &observed.pr_id);
        let observed = observed.clone();

        let state = self.findings.get_mut(&finding_id)?;
        if state.last_emitted.as_ref() == Some(&emitted_key) {
            return None;
        }
        state.last_emitted = Some(emitted_key);

        if scored.score.promoted && scored.pair.disappearance_confirmed {
            if let Some(ordinal) = pr_ordinal {
                self.reintroductions
                    .record_fix(&observed, &scored.pair.pair_id, ordinal);
            }
        }
        tracing::debug!(
            %finding_id,
            pair_id = %scored.pair.pair_id,
            confidence = scored.score.confidence_score,
            promoted = scored.score.promoted,
            pairing_type = %scored.pair.pairing_type,
            "pair scored"
        );
        Some(scored)
    }

    fn pairing_type(
        &self,
        observed: &FindingObserved,
        fix: &FixApplied,
        resolved: &FindingResolved,
        pr_commits: &[String],
    ) -> PairingType {
        if fix.tool_autofix {
            PairingType::Autofix
        } else if resolved.fix_commit_sha == fix.fix_commit_sha {
            PairingType::SameCommit
        } else if pr_commits.iter().any(|c| *c == fix.fix_commit_sha) {
            PairingType::SamePr
        } else if fix.applied_at >= observed.observed_at
            && fix.applied_at - observed.observed_at <= self.temporal_window
        {
            PairingType::Temporal
        } else {
            PairingType::Inferred
        }
    }

    fn is_config_file(&self, path: &str) -> bool {
        let name = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
        self.config_file_names.contains(name)
    }
}

/// Strongest pairing first, then anchored, then earliest, then by fix id.
fn compare_evidence(a: &FixEvidence<'_>, b: &FixEvidence<'_>) -> Ordering {
    b.pairing_type
        .rank()
        .cmp(&a.pairing_type.rank())
        .then(b.anchored.cmp(&a.anchored))
        .then(a.fix.applied_at.cmp(&b.fix.applied_at))
        .then(a.fix.fix_id.cmp(&b.fix.fix_id))
}

/// The first back-ticked or quoted segment of a finding message.
pub fn offending_token(message: &str) -> Option<String> {
    for quote in ['`', '\'', '"'] {
        let mut parts = message.split(quote);
        parts.next();
        if let Some(inner) = parts.next() {
            // Only a closed quote counts.
            if parts.next().is_some() || message.ends_with(quote) {
                let inner = inner.trim();
                if !inner.is_empty() {
                    return Some(inner.to_string());
                }
            }
        }
    }
    None
}

/// Whether `token` occurs in `line` without being part of a longer identifier.
pub fn contains_token(line: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    let starts_ident = token.chars().next().is_some_and(is_ident);
    let ends_ident = token.chars().last().is_some_and(is_ident);
    line.match_indices(token).any(|(idx, _)| {
        let before_ok = !starts_ident || !line[..idx].chars().next_back().is_some_and(is_ident);
        let after_ok = !ends_ident || !line[idx + token.len()..].chars().next().is_some_and(is_ident);
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comes_from_first_closed_quote() {
        assert_eq!(offending_token("use of `eval` is unsafe"), Some("eval".into()));
        assert_eq!(offending_token("unused import 'os'"), Some("os".into()));
        assert_eq!(offending_token("line too long"), None);
        assert_eq!(offending_token("dangling `quote"), None);
    }

    #[test]
    fn token_match_respects_identifier_boundaries() {
        assert!(contains_token("x = eval(s)", "eval"));
        assert!(!contains_token("x = literal_eval(s)", "eval"));
        assert!(!contains_token("evaluate()", "eval"));
        assert!(contains_token("a != b", "!="));
    }
}
