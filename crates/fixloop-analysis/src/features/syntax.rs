//! Syntax-tree feature extraction for languages with a bundled grammar.

use rustc_hash::FxHashSet;
use tree_sitter::{Node, Parser};

use fixloop_core::models::{SourceLanguage, StructuralFeatures};

/// Node kinds that carry meaning for one grammar.
struct KindTable {
    classes: &'static [&'static str],
    functions: &'static [&'static str],
    blocks: &'static [&'static str],
    branches: &'static [&'static str],
    identifiers: &'static [&'static str],
    decorators: &'static [&'static str],
    heritage: &'static [&'static str],
    type_hints: &'static [&'static str],
    statically_typed: bool,
}

const PYTHON: KindTable = KindTable {
    classes: &["class_definition"],
    functions: &["function_definition", "lambda"],
    blocks: &["block"],
    branches: &[
        "if_statement", "elif_clause", "for_statement", "while_statement",
        "except_clause", "conditional_expression", "boolean_operator",
        "case_clause", "for_in_clause",
    ],
    identifiers: &["identifier"],
    decorators: &["decorator"],
    heritage: &["argument_list"],
    type_hints: &["type", "typed_parameter", "typed_default_parameter"],
    statically_typed: false,
};

const JAVASCRIPT: KindTable = KindTable {
    classes: &["class_declaration", "class"],
    functions: &[
        "function_declaration", "function_expression", "arrow_function",
        "method_definition", "generator_function_declaration",
    ],
    blocks: &["statement_block", "class_body"],
    branches: &[
        "if_statement", "for_statement", "for_in_statement", "while_statement",
        "do_statement", "catch_clause", "ternary_expression", "switch_case",
    ],
    identifiers: &["identifier", "property_identifier", "shorthand_property_identifier"],
    decorators: &["decorator"],
    heritage: &["class_heritage"],
    type_hints: &[],
    statically_typed: false,
};

const TYPESCRIPT: KindTable = KindTable {
    classes: &["class_declaration", "class", "interface_declaration", "abstract_class_declaration"],
    functions: JAVASCRIPT.functions,
    blocks: &["statement_block", "class_body", "interface_body"],
    branches: JAVASCRIPT.branches,
    identifiers: &[
        "identifier", "property_identifier", "shorthand_property_identifier",
        "type_identifier",
    ],
    decorators: &["decorator"],
    heritage: &["class_heritage", "extends_clause", "implements_clause"],
    type_hints: &["type_annotation"],
    statically_typed: false,
};

const RUST: KindTable = KindTable {
    classes: &["struct_item", "enum_item", "trait_item"],
    functions: &["function_item", "closure_expression"],
    blocks: &["block", "declaration_list", "match_block"],
    branches: &[
        "if_expression", "match_arm", "for_expression", "while_expression",
        "loop_expression", "try_expression",
    ],
    identifiers: &["identifier", "field_identifier", "type_identifier"],
    decorators: &["attribute_item"],
    heritage: &["trait_bounds"],
    type_hints: &[],
    statically_typed: true,
};

const GO: KindTable = KindTable {
    classes: &["type_spec"],
    functions: &["function_declaration", "method_declaration", "func_literal"],
    blocks: &["block"],
    branches: &[
        "if_statement", "for_statement", "expression_case", "type_case",
        "communication_case",
    ],
    identifiers: &["identifier", "field_identifier", "type_identifier", "package_identifier"],
    decorators: &[],
    heritage: &[],
    type_hints: &[],
    statically_typed: true,
};

const JAVA: KindTable = KindTable {
    classes: &["class_declaration", "interface_declaration", "enum_declaration", "record_declaration"],
    functions: &["method_declaration", "constructor_declaration", "lambda_expression"],
    blocks: &["block", "class_body", "interface_body"],
    branches: &[
        "if_statement", "for_statement", "enhanced_for_statement", "while_statement",
        "do_statement", "catch_clause", "ternary_expression", "switch_label",
    ],
    identifiers: &["identifier", "type_identifier"],
    decorators: &["marker_annotation", "annotation"],
    heritage: &["superclass", "super_interfaces"],
    type_hints: &[],
    statically_typed: true,
};

fn grammar(language: SourceLanguage) -> Option<(tree_sitter::Language, &'static KindTable)> {
    match language {
        SourceLanguage::Python => Some((tree_sitter_python::LANGUAGE.into(), &PYTHON)),
        SourceLanguage::JavaScript => Some((tree_sitter_javascript::LANGUAGE.into(), &JAVASCRIPT)),
        SourceLanguage::TypeScript => Some((
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            &TYPESCRIPT,
        )),
        SourceLanguage::Rust => Some((tree_sitter_rust::LANGUAGE.into(), &RUST)),
        SourceLanguage::Go => Some((tree_sitter_go::LANGUAGE.into(), &GO)),
        SourceLanguage::Java => Some((tree_sitter_java::LANGUAGE.into(), &JAVA)),
        _ => None,
    }
}

/// Whether a grammar is bundled for `language`.
pub fn has_grammar(language: SourceLanguage) -> bool {
    grammar(language).is_some()
}

/// Features read off a syntax tree.
#[derive(Debug, Clone, Default)]
pub struct SyntaxFeatures {
    pub identifiers: Vec<String>,
    pub structural: StructuralFeatures,
    pub base_classes: Vec<String>,
    pub decorators: Vec<String>,
    pub error_nodes: u32,
}

/// Parse `source` and walk the tree. `None` when no grammar is bundled or
/// the parser produced no tree.
pub fn extract_syntax(source: &str, language: SourceLanguage) -> Option<SyntaxFeatures> {
    let (ts_language, table) = grammar(language)?;
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&ts_language) {
        tracing::warn!(%language, error = %e, "grammar rejected by parser");
        return None;
    }
    let tree = parser.parse(source, None)?;
    let bytes = source.as_bytes();

    let mut out = SyntaxFeatures::default();
    let mut identifiers = FxHashSet::default();
    let mut base_classes = FxHashSet::default();
    let mut decorators = FxHashSet::default();
    let mut branches = 0u32;

    let mut stack: Vec<(Node<'_>, u32)> = vec![(tree.root_node(), 0)];
    while let Some((node, depth)) = stack.pop() {
        let kind = node.kind();
        if node.is_error() || node.is_missing() {
            out.error_nodes += 1;
        }
        if table.classes.contains(&kind) {
            out.structural.class_count += 1;
        }
        if table.functions.contains(&kind) {
            out.structural.function_count += 1;
        }
        if table.branches.contains(&kind) {
            branches += 1;
        }
        if table.type_hints.contains(&kind) {
            out.structural.has_type_hints = true;
        }
        if table.identifiers.contains(&kind) {
            if let Ok(text) = node.utf8_text(bytes) {
                if text.len() >= 2 && text.len() <= 64 {
                    identifiers.insert(text.to_string());
                }
            }
        }
        if table.decorators.contains(&kind) {
            if let Ok(text) = node.utf8_text(bytes) {
                let name = decorator_name(text);
                if !name.is_empty() {
                    decorators.insert(name);
                }
            }
        }
        if table.heritage.contains(&kind)
            && node
                .parent()
                .is_some_and(|p| table.classes.contains(&p.kind()))
        {
            collect_identifiers(node, bytes, &mut base_classes);
        }
        if is_docstring(node, bytes, language) {
            out.structural.has_docstrings = true;
        }

        let child_depth = if table.blocks.contains(&kind) {
            depth + 1
        } else {
            depth
        };
        out.structural.max_nesting_depth = out.structural.max_nesting_depth.max(child_depth);
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                stack.push((child, child_depth));
            }
        }
    }

    out.structural.cyclomatic_complexity = 1 + branches;
    out.structural.line_count = source.lines().filter(|l| !l.trim().is_empty()).count() as u32;
    if table.statically_typed {
        out.structural.has_type_hints = true;
    }
    out.identifiers = sorted(identifiers);
    out.base_classes = sorted(base_classes);
    out.decorators = sorted(decorators);
    Some(out)
}

fn collect_identifiers(node: Node<'_>, bytes: &[u8], into: &mut FxHashSet<String>) {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if matches!(n.kind(), "identifier" | "type_identifier" | "attribute") {
            if let Ok(text) = n.utf8_text(bytes) {
                into.insert(text.to_string());
            }
            continue;
        }
        for i in 0..n.child_count() {
            if let Some(child) = n.child(i) {
                stack.push(child);
            }
        }
    }
}

fn is_docstring(node: Node<'_>, bytes: &[u8], language: SourceLanguage) -> bool {
    match language {
        SourceLanguage::Python => {
            node.kind() == "expression_statement"
                && node.named_child_count() == 1
                && node.named_child(0).is_some_and(|c| c.kind() == "string")
        }
        _ => {
            node.kind().contains("comment")
                && node
                    .utf8_text(bytes)
                    .is_ok_and(|t| t.starts_with("/**") || t.starts_with("///") || t.starts_with("//!"))
        }
    }
}

fn decorator_name(text: &str) -> String {
    let trimmed = text
        .trim()
        .trim_start_matches('@')
        .trim_start_matches("#[")
        .trim_start_matches("#![");
    trimmed
        .split(|c: char| c == '(' || c == ']' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_string()
}

fn sorted(set: FxHashSet<String>) -> Vec<String> {
    let mut v: Vec<String> = set.into_iter().collect();
    v.sort();
    v
}
