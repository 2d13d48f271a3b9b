//! Decoding of string literals read statically from resolver sources.

use tree_sitter::Node;

use super::node_text;

/// Value of a string literal or of a template string without substitutions.
///
/// Returns `None` for any other node, including templates with `${...}`.
pub fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => {}
        "template_string" => {
            let mut cursor = node.walk();
            let has_substitution =
                node.named_children(&mut cursor).any(|c| c.kind() == "template_substitution");
            if has_substitution {
                return None;
            }
        }
        _ => return None,
    }
    let raw = node_text(node, source);
    let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or_default();
    Some(decode(inner))
}

/// Decode the escape sequences of a literal body.
pub fn decode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push('\\');
            break;
        };
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            // Line continuation.
            '\n' | '\u{2028}' | '\u{2029}' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                push_code_point(&mut out, &hex, 'x');
            }
            'u' => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                push_code_point(&mut out, &hex, 'u');
            }
            other => out.push(other),
        }
    }
    out
}

fn push_code_point(out: &mut String, hex: &str, marker: char) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => {
            out.push('\\');
            out.push(marker);
            out.push_str(hex);
        }
    }
}
