//! Declarative codemod documents.
//!
//! A codemod is a TOML document declaring `format = "fixloop-codemod/v1"`
//! and exactly one `[[entry]]` named `transform`, taking `["source"]` and
//! returning `"text"`. Its `steps` run in order over the source text.

use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;
use serde::{Deserialize, Serialize};

use fixloop_core::constants::{CODEMOD_ENTRY_NAME, CODEMOD_FORMAT};
use fixloop_core::errors::{CodemodError, SandboxError};

pub const ENTRY_PARAMS: [&str; 1] = ["source"];
pub const ENTRY_RETURNS: &str = "text";

/// One transformation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Replace every occurrence of `find`.
    ReplaceLiteral { find: String, replace: String },
    /// Replace every match of `pattern`; `replace` may use `$1`-style groups.
    ReplaceRegex { pattern: String, replace: String },
    /// Drop every line whose trimmed content equals `line` trimmed.
    DeleteLine { line: String },
    /// Insert `text` as a new line after every line containing `anchor`.
    InsertAfter { anchor: String, text: String },
}

impl Step {
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::ReplaceLiteral { .. } => "replace_literal",
            Self::ReplaceRegex { .. } => "replace_regex",
            Self::DeleteLine { .. } => "delete_line",
            Self::InsertAfter { .. } => "insert_after",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDef {
    pub name: String,
    pub params: Vec<String>,
    pub returns: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodemodDocument {
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub entry: Vec<EntryDef>,
}

impl CodemodDocument {
    /// A single-entry document around `steps`.
    pub fn single_entry(
        pattern_id: &str,
        rule_id: &str,
        language: &str,
        steps: Vec<Step>,
    ) -> Self {
        Self {
            format: CODEMOD_FORMAT.to_string(),
            pattern_id: Some(pattern_id.to_string()),
            rule_id: Some(rule_id.to_string()),
            language: Some(language.to_string()),
            entry: vec![EntryDef {
                name: CODEMOD_ENTRY_NAME.to_string(),
                params: ENTRY_PARAMS.iter().map(|p| p.to_string()).collect(),
                returns: ENTRY_RETURNS.to_string(),
                steps,
            }],
        }
    }

    pub fn render(&self) -> Result<String, CodemodError> {
        toml::to_string(self).map_err(|e| CodemodError::Syntax(e.to_string()))
    }
}

#[derive(Debug)]
enum CompiledStep {
    Literal { find: String, replace: String },
    Regex { regex: Regex, replace: String },
    DeleteLine { line: String },
    InsertAfter { anchor: String, text: String },
}

/// A statically checked codemod, ready to run.
#[derive(Debug)]
pub struct CompiledCodemod {
    steps: Vec<CompiledStep>,
}

impl CompiledCodemod {
    /// Static check: TOML syntax, the single-entry interface, and step
    /// compilation.
    pub fn compile(source: &str) -> Result<Self, CodemodError> {
        let doc: CodemodDocument =
            toml::from_str(source).map_err(|e| CodemodError::Syntax(e.to_string()))?;
        if doc.format != CODEMOD_FORMAT {
            return Err(CodemodError::Interface(format!(
                "unsupported format '{}'",
                doc.format
            )));
        }
        let entry = match doc.entry.as_slice() {
            [entry] => entry,
            entries => {
                return Err(CodemodError::Interface(format!(
                    "expected exactly one entry, found {}",
                    entries.len()
                )))
            }
        };
        if entry.name != CODEMOD_ENTRY_NAME {
            return Err(CodemodError::Interface(format!(
                "entry must be named '{CODEMOD_ENTRY_NAME}', found '{}'",
                entry.name
            )));
        }
        if entry.params != ENTRY_PARAMS {
            return Err(CodemodError::Interface(format!(
                "entry must take {ENTRY_PARAMS:?}, found {:?}",
                entry.params
            )));
        }
        if entry.returns != ENTRY_RETURNS {
            return Err(CodemodError::Interface(format!(
                "entry must return '{ENTRY_RETURNS}', found '{}'",
                entry.returns
            )));
        }
        if entry.steps.is_empty() {
            return Err(CodemodError::Interface("entry has no steps".into()));
        }

        let steps = entry
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| compile_step(index, step))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }

    /// Run every step over `source`. `cancel` is checked between steps and
    /// between lines; output larger than `output_budget` bytes fails.
    pub fn apply(
        &self,
        source: &str,
        cancel: &AtomicBool,
        output_budget: usize,
    ) -> Result<String, SandboxError> {
        let mut text = source.to_string();
        for step in &self.steps {
            check_cancelled(cancel)?;
            text = match step {
                CompiledStep::Literal { find, replace } => text.replace(find.as_str(), replace),
                CompiledStep::Regex { regex, replace } => {
                    regex.replace_all(&text, replace.as_str()).into_owned()
                }
                CompiledStep::DeleteLine { line } => {
                    let target = line.trim();
                    let mut out = String::with_capacity(text.len());
                    for chunk in text.split_inclusive('\n') {
                        check_cancelled(cancel)?;
                        if chunk.trim() != target {
                            out.push_str(chunk);
                        }
                    }
                    out
                }
                CompiledStep::InsertAfter { anchor, text: insert } => {
                    let mut out = String::with_capacity(text.len() + insert.len());
                    for chunk in text.split_inclusive('\n') {
                        check_cancelled(cancel)?;
                        out.push_str(chunk);
                        if chunk.contains(anchor.as_str()) {
                            let terminated = chunk.ends_with('\n');
                            if !terminated {
                                out.push('\n');
                            }
                            out.push_str(insert);
                            if terminated {
                                out.push('\n');
                            }
                        }
                        if out.len() > output_budget {
                            return Err(SandboxError::OutputBudgetExceeded {
                                limit: output_budget,
                            });
                        }
                    }
                    out
                }
            };
            if text.len() > output_budget {
                return Err(SandboxError::OutputBudgetExceeded {
                    limit: output_budget,
                });
            }
        }
        Ok(text)
    }
}

fn compile_step(index: usize, step: &Step) -> Result<CompiledStep, CodemodError> {
    let invalid = |message: &str| CodemodError::StepCompilation {
        index,
        message: message.to_string(),
    };
    match step {
        Step::ReplaceLiteral { find, replace } => {
            if find.is_empty() {
                return Err(invalid("replace_literal needs a non-empty 'find'"));
            }
            Ok(CompiledStep::Literal {
                find: find.clone(),
                replace: replace.clone(),
            })
        }
        Step::ReplaceRegex { pattern, replace } => {
            let regex = Regex::new(pattern).map_err(|e| CodemodError::StepCompilation {
                index,
                message: e.to_string(),
            })?;
            if regex.is_match("") {
                return Err(invalid("replace_regex pattern matches the empty string"));
            }
            Ok(CompiledStep::Regex {
                regex,
                replace: replace.clone(),
            })
        }
        Step::DeleteLine { line } => {
            if line.trim().is_empty() {
                return Err(invalid("delete_line needs a non-blank 'line'"));
            }
            Ok(CompiledStep::DeleteLine { line: line.clone() })
        }
        Step::InsertAfter { anchor, text } => {
            if anchor.is_empty() {
                return Err(invalid("insert_after needs a non-empty 'anchor'"));
            }
            Ok(CompiledStep::InsertAfter {
                anchor: anchor.clone(),
                text: text.clone(),
            })
        }
    }
}

fn check_cancelled(cancel: &AtomicBool) -> Result<(), SandboxError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(SandboxError::Execution("cancelled".into()));
    }
    Ok(())
}

/// `tx-v1:<blake3>` over each step's op name and length-prefixed fields.
pub fn transform_signature(steps: &[Step]) -> String {
    let mut hasher = blake3::Hasher::new();
    for step in steps {
        let fields: [&str; 2] = match step {
            Step::ReplaceLiteral { find, replace } => [find.as_str(), replace.as_str()],
            Step::ReplaceRegex { pattern, replace } => [pattern.as_str(), replace.as_str()],
            Step::DeleteLine { line } => [line.as_str(), ""],
            Step::InsertAfter { anchor, text } => [anchor.as_str(), text.as_str()],
        };
        for field in std::iter::once(step.op_name()).chain(fields) {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    format!(
        "{}:{}",
        fixloop_core::constants::TRANSFORM_SIGNATURE_VERSION,
        hasher.finalize().to_hex()
    )
}
