//! Text heuristics for languages without a bundled grammar.

use regex::Regex;
use rustc_hash::FxHashSet;

use fixloop_core::models::StructuralFeatures;

use super::syntax::SyntaxFeatures;

/// Reserved words across common languages; never reported as keywords.
const STOPWORDS: &[&str] = &[
    "if", "else", "elif", "for", "while", "do", "return", "def", "class", "fn", "func",
    "function", "let", "var", "const", "pub", "self", "this", "true", "false", "null",
    "nil", "none", "and", "or", "not", "in", "is", "new", "end", "then", "begin", "case",
    "when", "switch", "break", "continue", "try", "catch", "except", "finally", "import",
    "from", "as", "use", "with", "public", "private", "protected", "static", "void", "int",
    "string", "bool", "struct", "enum", "impl", "module", "require", "include", "yield",
    "async", "await", "match", "lambda", "pass", "raise", "throw", "throws", "package",
];

/// Regex-based extractor. Construct once and reuse.
#[derive(Debug, Clone)]
pub struct MinimalExtractor {
    identifier: Regex,
    class_decl: Regex,
    function_decl: Regex,
    branch: Regex,
    decorator: Regex,
    type_hint: Regex,
    stopwords: FxHashSet<&'static str>,
}

impl MinimalExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            identifier: Regex::new(r"[A-Za-z_][A-Za-z0-9_]*")?,
            class_decl: Regex::new(r"(?m)^\s*(?:class|struct|interface|module|trait)\s+\w+")?,
            function_decl: Regex::new(r"(?m)\b(?:def|function|fn|func|sub)\s+\w+")?,
            branch: Regex::new(r"\b(?:if|elif|elsif|for|foreach|while|until|case|when|catch|rescue|unless)\b|&&|\|\|")?,
            decorator: Regex::new(r"(?m)^\s*@([A-Za-z_][\w.]*)")?,
            type_hint: Regex::new(r"->\s*\w|:\s*[A-Z]\w*[\]\[<>\w]*\s*[=,)]")?,
            stopwords: STOPWORDS.iter().copied().collect(),
        })
    }

    pub fn extract(&self, source: &str) -> SyntaxFeatures {
        let identifiers: FxHashSet<String> = self
            .identifier
            .find_iter(source)
            .map(|m| m.as_str())
            .filter(|s| s.len() >= 2 && s.len() <= 64)
            .filter(|s| !self.stopwords.contains(s.to_ascii_lowercase().as_str()))
            .map(str::to_string)
            .collect();
        let decorators: FxHashSet<String> = self
            .decorator
            .captures_iter(source)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();

        let structural = StructuralFeatures {
            class_count: self.class_decl.find_iter(source).count() as u32,
            function_count: self.function_decl.find_iter(source).count() as u32,
            max_nesting_depth: nesting_depth(source),
            line_count: source.lines().filter(|l| !l.trim().is_empty()).count() as u32,
            cyclomatic_complexity: 1 + self.branch.find_iter(source).count() as u32,
            has_type_hints: self.type_hint.is_match(source),
            has_docstrings: source.contains("\"\"\"")
                || source.contains("/**")
                || source.contains("///")
                || source.lines().any(|l| l.trim_start().starts_with("=begin")),
        };

        let mut identifiers: Vec<String> = identifiers.into_iter().collect();
        identifiers.sort();
        let mut decorators: Vec<String> = decorators.into_iter().collect();
        decorators.sort();
        SyntaxFeatures {
            identifiers,
            structural,
            base_classes: Vec::new(),
            decorators,
            error_nodes: 0,
        }
    }
}

/// Deepest of brace depth and indentation depth (4 columns per level).
fn nesting_depth(source: &str) -> u32 {
    let mut depth: i64 = 0;
    let mut max_brace: i64 = 0;
    for c in source.chars() {
        match c {
            '{' => {
                depth += 1;
                max_brace = max_brace.max(depth);
            }
            '}' => depth = (depth - 1).max(0),
            _ => {}
        }
    }
    let max_indent = source
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            let cols: usize = l
                .chars()
                .take_while(|c| c.is_whitespace())
                .map(|c| if c == '\t' { 4 } else { 1 })
                .sum();
            cols / 4
        })
        .max()
        .unwrap_or(0);
    (max_brace as u32).max(max_indent as u32)
}
