//! Deterministic codemod generation from fix evidence.
//!
//! Strategies, in order: one narrowed token edit that every evidence line
//! change agrees on; line-block replacements taken from the best diff;
//! anchored insertions for pure additions. No usable edit is a
//! `NoDeterministicFix`.

use std::collections::BTreeSet;

use fixloop_core::errors::CodemodError;
use fixloop_core::models::{
    CodemodDefinition, CodemodStatus, FindingFixPair, LearnedPattern, SourceLanguage,
};

use super::anti_pattern::AntiPatternValidator;
use super::dsl::{transform_signature, CodemodDocument, Step};
use crate::scoring::{parse_hunks, DiffLine, ParsedHunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStrategy {
    NarrowedToken,
    LineBlock,
}

#[derive(Debug, Clone)]
pub struct GeneratedCodemod {
    /// Pending until replay decides.
    pub definition: CodemodDefinition,
    pub anti_pattern: AntiPatternValidator,
    pub strategy: EditStrategy,
}

/// One removed/added line block of a hunk, with the context line before it.
#[derive(Debug, Clone, Default)]
struct ChangeBlock {
    preceding: Option<String>,
    removed: Vec<String>,
    added: Vec<String>,
}

fn change_blocks(hunk: &ParsedHunk) -> Vec<ChangeBlock> {
    let mut blocks = Vec::new();
    let mut current = ChangeBlock::default();
    let mut last_context: Option<String> = None;
    for line in &hunk.lines {
        match line {
            DiffLine::Context(text) => {
                if !current.removed.is_empty() || !current.added.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
                last_context = Some(text.clone());
            }
            DiffLine::Removed(text) => {
                if current.removed.is_empty() && current.added.is_empty() {
                    current.preceding = last_context.clone();
                }
                current.removed.push(text.clone());
            }
            DiffLine::Added(text) => {
                if current.removed.is_empty() && current.added.is_empty() {
                    current.preceding = last_context.clone();
                }
                current.added.push(text.clone());
            }
        }
    }
    if !current.removed.is_empty() || !current.added.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn char_class(c: char) -> u8 {
    if is_ident(c) {
        0
    } else if c.is_whitespace() {
        1
    } else {
        2
    }
}

/// Identifier runs, whitespace runs, and single punctuation characters.
fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut prev: Option<u8> = None;
    for (i, c) in line.char_indices() {
        let class = char_class(c);
        if prev.is_some_and(|p| p != class || class == 2) {
            tokens.push(&line[start..i]);
            start = i;
        }
        prev = Some(class);
    }
    if start < line.len() {
        tokens.push(&line[start..]);
    }
    tokens
}

/// The smallest token span that differs between two lines, as
/// (old, new). `None` when the lines are equal or the old side is empty.
pub fn narrowed_edit(old: &str, new: &str) -> Option<(String, String)> {
    let a = tokenize(old);
    let b = tokenize(new);
    let mut prefix = 0;
    while prefix < a.len() && prefix < b.len() && a[prefix] == b[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < a.len() - prefix
        && suffix < b.len() - prefix
        && a[a.len() - 1 - suffix] == b[b.len() - 1 - suffix]
    {
        suffix += 1;
    }
    let old_mid = a[prefix..a.len() - suffix].concat();
    let new_mid = b[prefix..b.len() - suffix].concat();
    if old_mid == new_mid || old_mid.trim().is_empty() {
        return None;
    }
    Some((old_mid, new_mid))
}

/// Regex for `token` that will not match inside a longer identifier.
pub fn token_regex(token: &str) -> String {
    let mut pattern = String::new();
    if token.chars().next().is_some_and(is_ident) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(token));
    if token.chars().last().is_some_and(is_ident) {
        pattern.push_str(r"\b");
    }
    pattern
}

fn escape_replacement(text: &str) -> String {
    text.replace('$', "$$")
}

#[derive(Debug, Clone, Default)]
pub struct CodemodGenerator;

impl CodemodGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Build a pending codemod for `pattern` from its evidence pairs.
    pub fn generate(
        &self,
        pattern: &LearnedPattern,
        evidence: &[FindingFixPair],
    ) -> Result<GeneratedCodemod, CodemodError> {
        let no_fix = |reason: &str| CodemodError::NoDeterministicFix {
            pattern_id: pattern.pattern_id.clone(),
            reason: reason.to_string(),
        };
        let mut ordered: Vec<&FindingFixPair> = evidence.iter().collect();
        ordered.sort_by(|a, b| {
            b.confidence_score
                .total_cmp(&a.confidence_score)
                .then_with(|| a.pair_id.cmp(&b.pair_id))
        });
        let best = ordered.first().ok_or_else(|| no_fix("no evidence"))?;

        let (steps, strategy) = match narrowed_token_steps(&ordered) {
            Some(steps) => (steps, EditStrategy::NarrowedToken),
            None => (
                line_block_steps(best).ok_or_else(|| no_fix("best diff has no anchored edit"))?,
                EditStrategy::LineBlock,
            ),
        };

        let language = SourceLanguage::from_path(&best.file_path);
        let document =
            CodemodDocument::single_entry(&pattern.pattern_id, &pattern.pattern_type, language.name(), steps.clone());
        let codemod_source = document.render()?;
        let signature = transform_signature(&steps);
        let anti_pattern = AntiPatternValidator::from_evidence(&signature, &ordered);

        let mut hasher = blake3::Hasher::new();
        hasher.update(pattern.pattern_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(signature.as_bytes());
        let codemod_id = format!("cm-{}", &hasher.finalize().to_hex()[..32]);

        tracing::debug!(
            pattern_id = %pattern.pattern_id,
            %codemod_id,
            strategy = ?strategy,
            steps = steps.len(),
            "codemod generated"
        );
        Ok(GeneratedCodemod {
            definition: CodemodDefinition {
                codemod_id,
                pattern_id: pattern.pattern_id.clone(),
                rule_id: pattern.pattern_type.clone(),
                language: language.name().to_string(),
                codemod_source,
                transform_signature: signature,
                status: CodemodStatus::Pending,
                replay_result: None,
            },
            anti_pattern,
            strategy,
        })
    }
}

/// A single token edit shared by every changed line of every pair.
fn narrowed_token_steps(evidence: &[&FindingFixPair]) -> Option<Vec<Step>> {
    let mut edits = BTreeSet::new();
    for pair in evidence {
        let mut saw_change = false;
        for hunk in parse_hunks(&pair.diff_hunks) {
            for block in change_blocks(&hunk) {
                if block.removed.len() != block.added.len() {
                    return None;
                }
                for (old, new) in block.removed.iter().zip(&block.added) {
                    edits.insert(narrowed_edit(old, new)?);
                    saw_change = true;
                }
            }
        }
        if !saw_change {
            return None;
        }
    }
    if edits.len() != 1 {
        return None;
    }
    let (old, new) = edits.into_iter().next()?;
    Some(vec![Step::ReplaceRegex {
        pattern: token_regex(&old),
        replace: escape_replacement(&new),
    }])
}

fn line_block_steps(best: &FindingFixPair) -> Option<Vec<Step>> {
    let mut steps = Vec::new();
    for hunk in parse_hunks(&best.diff_hunks) {
        for block in change_blocks(&hunk) {
            let paired = block.removed.len().min(block.added.len());
            for (old, new) in block.removed.iter().zip(&block.added).take(paired) {
                if old.trim().is_empty() {
                    return None;
                }
                steps.push(Step::ReplaceLiteral {
                    find: old.clone(),
                    replace: new.clone(),
                });
            }
            for old in block.removed.iter().skip(paired) {
                if old.trim().is_empty() {
                    continue;
                }
                steps.push(Step::DeleteLine { line: old.clone() });
            }
            if block.added.len() > paired {
                let anchor = if paired > 0 {
                    Some(block.added[paired - 1].clone())
                } else {
                    block.preceding.clone()
                };
                let anchor = anchor.filter(|a| !a.trim().is_empty())?;
                steps.push(Step::InsertAfter {
                    anchor,
                    text: block.added[paired..].join("\n"),
                });
            }
        }
    }
    if steps.is_empty() {
        None
    } else {
        Some(steps)
    }
}
