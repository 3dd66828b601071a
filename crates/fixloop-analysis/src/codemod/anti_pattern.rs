//! Reintroduction detection from the removed side of fix evidence.

use aho_corasick::AhoCorasick;

use fixloop_core::models::FindingFixPair;

use crate::scoring::parse_hunks;

/// Shortest removed line kept as a matcher.
const MIN_MATCHER_LEN: usize = 4;

/// Literal matchers taken from lines the fixes removed. A later diff that
/// adds one of them back reintroduces the anti-pattern.
#[derive(Debug, Clone)]
pub struct AntiPatternValidator {
    transform_signature: String,
    matchers: Vec<String>,
    automaton: Option<AhoCorasick>,
}

impl AntiPatternValidator {
    pub fn from_evidence(transform_signature: &str, evidence: &[&FindingFixPair]) -> Self {
        let mut matchers: Vec<String> = evidence
            .iter()
            .flat_map(|pair| parse_hunks(&pair.diff_hunks))
            .flat_map(|hunk| {
                let added: Vec<String> = hunk.added().map(|l| l.trim().to_string()).collect();
                hunk.removed()
                    .map(|l| l.trim().to_string())
                    .filter(|l| l.len() >= MIN_MATCHER_LEN && !added.contains(l))
                    .collect::<Vec<_>>()
            })
            .collect();
        matchers.sort();
        matchers.dedup();
        Self::with_matchers(transform_signature, matchers)
    }

    pub fn with_matchers(transform_signature: &str, matchers: Vec<String>) -> Self {
        let automaton = if matchers.is_empty() {
            None
        } else {
            match AhoCorasick::new(&matchers) {
                Ok(ac) => Some(ac),
                Err(e) => {
                    tracing::warn!(error = %e, "anti-pattern automaton build failed");
                    None
                }
            }
        };
        Self {
            transform_signature: transform_signature.to_string(),
            matchers,
            automaton,
        }
    }

    pub fn transform_signature(&self) -> &str {
        &self.transform_signature
    }

    pub fn matchers(&self) -> &[String] {
        &self.matchers
    }

    /// Matchers found in `text`, sorted and deduplicated.
    pub fn scan(&self, text: &str) -> Vec<String> {
        let Some(ac) = &self.automaton else {
            return Vec::new();
        };
        let mut found: Vec<String> = ac
            .find_overlapping_iter(text)
            .map(|m| self.matchers[m.pattern().as_usize()].clone())
            .collect();
        found.sort();
        found.dedup();
        found
    }

    /// Matchers that the added lines of `diff_hunks` bring back.
    pub fn detect_reintroduction(&self, diff_hunks: &[String]) -> Vec<String> {
        let added: Vec<String> = parse_hunks(diff_hunks)
            .iter()
            .flat_map(|h| h.added().map(str::to_string).collect::<Vec<_>>())
            .collect();
        self.scan(&added.join("\n"))
    }
}
