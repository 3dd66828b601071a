//! Normalized feature records produced from code samples.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Languages the feature extractor knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Go,
    Java,
    Ruby,
    CSharp,
    Php,
    Unknown,
}

impl SourceLanguage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::Ruby => "ruby",
            Self::CSharp => "csharp",
            Self::Php => "php",
            Self::Unknown => "unknown",
        }
    }

    /// Resolve a language name or common alias. Unrecognized names map to
    /// `Unknown` so extraction can still degrade gracefully.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Self::Python,
            "javascript" | "js" | "jsx" => Self::JavaScript,
            "typescript" | "ts" | "tsx" => Self::TypeScript,
            "rust" | "rs" => Self::Rust,
            "go" | "golang" => Self::Go,
            "java" => Self::Java,
            "ruby" | "rb" => Self::Ruby,
            "csharp" | "c#" | "cs" => Self::CSharp,
            "php" => Self::Php,
            _ => Self::Unknown,
        }
    }

    /// Detect from a file extension.
    pub fn from_path(path: &str) -> Self {
        let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        match ext.to_ascii_lowercase().as_str() {
            "py" | "pyi" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "mts" | "cts" | "tsx" => Self::TypeScript,
            "rs" => Self::Rust,
            "go" => Self::Go,
            "java" => Self::Java,
            "rb" => Self::Ruby,
            "cs" => Self::CSharp,
            "php" => Self::Php,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether features came from a syntax tree or from text heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionQuality {
    Full,
    Minimal,
}

/// Structural metrics of a code sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralFeatures {
    pub class_count: u32,
    pub function_count: u32,
    pub max_nesting_depth: u32,
    pub line_count: u32,
    pub cyclomatic_complexity: u32,
    pub has_type_hints: bool,
    pub has_docstrings: bool,
}

/// Feature vector for one item (a finding/fix pair).
///
/// Set-valued fields are kept sorted and deduplicated, except `labels`,
/// which keeps the rule id first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub item_id: String,
    pub keywords: Vec<String>,
    pub pattern_indicators: Vec<String>,
    pub structural: StructuralFeatures,
    pub base_classes: Vec<String>,
    pub decorators: Vec<String>,
    pub labels: Vec<String>,
    pub language: SourceLanguage,
    pub domain: String,
    pub quality_score: Option<f64>,
    pub extraction_quality: ExtractionQuality,
}

impl FeatureRecord {
    /// The primary label (the rule id for pair-derived records).
    pub fn primary_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_resolution() {
        assert_eq!(SourceLanguage::from_path("src/app.tsx"), SourceLanguage::TypeScript);
        assert_eq!(SourceLanguage::from_path("Makefile"), SourceLanguage::Unknown);
        assert_eq!(SourceLanguage::from_name("PY"), SourceLanguage::Python);
        assert_eq!(SourceLanguage::from_name("cobol"), SourceLanguage::Unknown);
    }
}
