//! TypeScript type erasure by byte-range deletion.
//!
//! Only constructs with no runtime meaning are removed: annotations, type
//! parameters and arguments, interfaces, type aliases, ambient declarations,
//! `as`/`satisfies` tails, non-null assertions and modifiers. Constructs that
//! would need code generation (`enum`, `namespace`) are rejected.

use std::ops::Range;

use tree_sitter::Node;

use super::{parse_tree, SyntaxError};

/// Node kinds deleted in full wherever they appear.
const ERASED_KINDS: &[&str] = &[
    "type_annotation",
    "type_parameters",
    "type_arguments",
    "asserts_annotation",
    "type_predicate_annotation",
    "accessibility_modifier",
    "override_modifier",
    "implements_clause",
    "interface_declaration",
    "type_alias_declaration",
    "ambient_declaration",
    "function_signature",
    "method_signature",
    "abstract_method_signature",
    "index_signature",
];

/// Single-token children removed from their parent.
const ERASED_TOKENS: &[(&str, &str)] = &[
    ("optional_parameter", "?"),
    ("public_field_definition", "?"),
    ("public_field_definition", "!"),
    ("public_field_definition", "readonly"),
    ("public_field_definition", "declare"),
    ("public_field_definition", "abstract"),
    ("abstract_class_declaration", "abstract"),
    ("variable_declarator", "!"),
];

/// Return `source` with all TypeScript-only syntax deleted.
pub fn erase_types(source: &str, label: &str) -> Result<String, SyntaxError> {
    let tree = parse_tree(source, label)?;
    let mut ranges = Vec::new();
    collect(tree.root_node(), source, label, &mut ranges)?;
    Ok(apply_deletions(source, ranges))
}

fn collect(
    node: Node<'_>,
    source: &str,
    label: &str,
    out: &mut Vec<Range<usize>>,
) -> Result<(), SyntaxError> {
    let kind = node.kind();
    if matches!(kind, "enum_declaration" | "internal_module" | "module") {
        return Err(SyntaxError::Unsupported {
            label: label.to_string(),
            line: node.start_position().row + 1,
            construct: format!("`{kind}` has no type-erased equivalent"),
        });
    }

    if ERASED_KINDS.contains(&kind) {
        // An exported interface/type alias goes together with its `export`.
        let target = match node.parent() {
            Some(parent) if parent.kind() == "export_statement" => parent,
            _ => node,
        };
        out.push(target.byte_range());
        return Ok(());
    }

    match kind {
        "import_statement" | "export_statement" if is_type_only(node) => {
            out.push(node.byte_range());
            return Ok(());
        }
        "import_specifier" | "export_specifier" if is_type_only(node) => {
            out.push(node.byte_range());
            return Ok(());
        }
        "as_expression" | "satisfies_expression" => {
            if let Some(expr) = node.named_child(0) {
                out.push(expr.end_byte()..node.end_byte());
                return collect(expr, source, label, out);
            }
        }
        "non_null_expression" => {
            if let Some(bang) = node.child(node.child_count().saturating_sub(1)) {
                out.push(bang.byte_range());
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if !child.is_named() && ERASED_TOKENS.contains(&(kind, child.kind())) {
            out.push(child.byte_range());
            continue;
        }
        collect(child, source, label, out)?;
    }
    Ok(())
}

/// `import type ...`, `export type { ... }` and `{ type X }` specifiers.
fn is_type_only(node: Node<'_>) -> bool {
    let first_tokens = node.child_count().min(2);
    (0..first_tokens)
        .filter_map(|i| node.child(i))
        .any(|c| !c.is_named() && c.kind() == "type")
}

fn apply_deletions(source: &str, mut ranges: Vec<Range<usize>>) -> String {
    ranges.sort_by_key(|r| (r.start, r.end));
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for range in ranges {
        if range.end <= cursor {
            continue;
        }
        let start = range.start.max(cursor);
        out.push_str(&source[cursor..start]);
        cursor = range.end;
    }
    out.push_str(&source[cursor..]);
    out
}
