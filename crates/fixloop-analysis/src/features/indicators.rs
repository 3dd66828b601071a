//! Pattern indicator detection with a single multi-pattern automaton.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use rustc_hash::FxHashSet;

/// (needle, indicator) pairs. Matching is ASCII case-insensitive.
const INDICATOR_TABLE: &[(&str, &str)] = &[
    ("eval(", "dynamic_eval"),
    ("exec(", "dynamic_exec"),
    ("literal_eval", "safe_literal_parse"),
    ("json.loads", "safe_literal_parse"),
    ("JSON.parse", "safe_literal_parse"),
    ("shell=True", "shell_invocation"),
    ("subprocess", "shell_invocation"),
    ("child_process", "shell_invocation"),
    ("try:", "error_handling"),
    ("try {", "error_handling"),
    ("except", "error_handling"),
    ("catch", "error_handling"),
    ("finally", "error_handling"),
    ("with open", "context_manager"),
    ("async ", "async_flow"),
    ("await ", "async_flow"),
    ("yield", "generator"),
    ("lambda", "closure"),
    ("=>", "closure"),
    (".unwrap()", "unwrap_call"),
    (".expect(", "unwrap_call"),
    ("?;", "error_propagation"),
    ("Optional[", "optional_value"),
    ("Option<", "optional_value"),
    ("== None", "none_equality"),
    ("!= None", "none_equality"),
    ("is None", "none_identity"),
    ("is not None", "none_identity"),
    ("=== null", "null_check"),
    ("== null", "null_check"),
    ("!= nil", "null_check"),
    ("import ", "import_change"),
    ("require(", "import_change"),
    ("use ", "import_change"),
    ("assert", "assertion"),
    ("logging.", "logging_output"),
    ("logger.", "logging_output"),
    ("console.log", "logging_output"),
    ("println!", "logging_output"),
    ("print(", "logging_output"),
    ("self.", "instance_state"),
    ("this.", "instance_state"),
    ("@property", "property_accessor"),
    ("__init__", "constructor"),
    ("constructor(", "constructor"),
    ("getInstance", "singleton"),
    ("Singleton", "singleton"),
    ("Factory", "factory"),
    ("subscribe", "observer"),
    ("addEventListener", "observer"),
    ("Adapter", "adapter"),
    (".format(", "string_formatting"),
    ("f\"", "string_formatting"),
    ("%s", "string_formatting"),
    ("format!(", "string_formatting"),
    ("SELECT ", "raw_sql"),
    ("INSERT INTO", "raw_sql"),
    ("md5", "weak_hash"),
    ("sha1", "weak_hash"),
    ("random.", "nondeterminism"),
    ("Math.random", "nondeterminism"),
    ("http://", "insecure_transport"),
    ("var ", "function_scoped_binding"),
    ("let ", "block_scoped_binding"),
    ("const ", "block_scoped_binding"),
    ("==", "loose_equality"),
    ("===", "strict_equality"),
    ("isinstance(", "type_check"),
    ("typeof ", "type_check"),
    ("unsafe ", "unsafe_block"),
    ("clone()", "explicit_clone"),
    ("TODO", "todo_marker"),
];

/// Detects design/architecture markers in source text.
#[derive(Debug, Clone)]
pub struct IndicatorMatcher {
    automaton: Option<AhoCorasick>,
}

impl Default for IndicatorMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorMatcher {
    pub fn new() -> Self {
        let needles: Vec<&str> = INDICATOR_TABLE.iter().map(|(n, _)| *n).collect();
        let automaton = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::Standard)
            .build(&needles);
        match automaton {
            Ok(ac) => Self {
                automaton: Some(ac),
            },
            Err(e) => {
                tracing::warn!(error = %e, "indicator automaton failed to build; indicators disabled");
                Self { automaton: None }
            }
        }
    }

    /// Every indicator present in `text`, sorted and deduplicated.
    pub fn detect(&self, text: &str) -> Vec<String> {
        let Some(ac) = &self.automaton else {
            return Vec::new();
        };
        let found: FxHashSet<&str> = ac
            .find_overlapping_iter(text)
            .map(|m| INDICATOR_TABLE[m.pattern().as_usize()].1)
            .collect();
        let mut out: Vec<String> = found.into_iter().map(str::to_string).collect();
        out.sort();
        out
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_overlapping_indicators() {
        let m = IndicatorMatcher::new();
        let found = m.detect("x = ast.literal_eval(s)\nif x is None: pass");
        assert!(found.contains(&"safe_literal_parse".to_string()));
        assert!(found.contains(&"none_identity".to_string()));
        assert!(!found.contains(&"shell_invocation".to_string()));
    }

    #[test]
    fn matching_ignores_ascii_case() {
        let m = IndicatorMatcher::new();
        assert!(m.detect("select * from t").contains(&"raw_sql".to_string()));
    }
}
