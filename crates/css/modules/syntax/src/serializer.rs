//! Rule tree to CSS text.

use crate::declarations::{DeclarationEdit, parse_declaration, rewrite_declarations};
use crate::rule::{RuleId, RuleTree, RuleType};

/// Serialize the whole tree.
///
/// When `preserve_custom_syntax` is false, custom-property declarations,
/// `@apply` statements, and declarations whose value uses `var()` are removed
/// from every rule body except inside keyframes.
#[inline]
pub fn serialize(tree: &RuleTree, preserve_custom_syntax: bool) -> String {
    serialize_rule(tree, tree.root(), preserve_custom_syntax)
}

/// Serialize `rule` and its descendants.
pub fn serialize_rule(tree: &RuleTree, rule: RuleId, preserve_custom_syntax: bool) -> String {
    let mut out = String::new();
    write_rule(tree, rule, preserve_custom_syntax, &mut out);
    out
}

fn write_rule(tree: &RuleTree, rule: RuleId, preserve: bool, out: &mut String) {
    let node = &tree[rule];
    let preserve = preserve || node.rule_type == RuleType::Keyframes;
    let descend = tree
        .first_child(rule)
        .is_some_and(|first| !tree[first].selector.starts_with("--"));
    let mut content = String::new();
    if descend {
        for child in tree.children(rule) {
            write_rule(tree, child, preserve, &mut content);
        }
    } else if !node.css_text.is_empty() {
        let body = if preserve {
            node.css_text.clone()
        } else {
            strip_custom_syntax(&node.css_text)
        };
        let body = body.trim();
        if !body.is_empty() {
            content.push_str("  ");
            content.push_str(body);
            content.push('\n');
        }
    }
    if content.is_empty() {
        return;
    }
    if node.selector.is_empty() {
        out.push_str(&content);
    } else {
        out.push_str(&node.selector);
        out.push_str(" {\n");
        out.push_str(&content);
        out.push_str("}\n\n");
    }
}

/// Remove shim-only syntax from a rule body.
pub fn strip_custom_syntax(text: &str) -> String {
    rewrite_declarations(text, |_, item| {
        if is_custom_syntax(item) {
            DeclarationEdit::Remove
        } else {
            DeclarationEdit::Keep
        }
    })
}

fn is_custom_syntax(item: &str) -> bool {
    if item.starts_with("--") || item.starts_with("@apply") {
        return true;
    }
    parse_declaration(item).is_some_and(|(_, value)| value.contains("var("))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn plain_css_round_trips() {
        let input = "a, b > c {color: red;   margin: 0 }\n@media print {\n  d { e: f; }\n}";
        let tree = parse(input);
        let expected = "a, b > c {\n  color: red;   margin: 0\n}\n\n\
                        @media print {\nd {\n  e: f;\n}\n\n}\n\n";
        assert_eq!(serialize(&tree, false), expected);
        assert_eq!(serialize(&parse(&serialize(&tree, false)), false), expected);
    }

    #[test]
    fn strips_shim_syntax_unless_preserved() {
        let tree = parse("a { --x: 1px; --m: { b: c }; @apply --m; color: var(--x); top: 0; }");
        assert_eq!(serialize(&tree, false), "a {\n  top: 0;\n}\n\n");
        let preserved = serialize(&tree, true);
        assert!(preserved.contains("color: var(--x);"));
        assert!(preserved.contains("@apply --m;"));
    }

    #[test]
    fn strips_var_reads_nested_in_functions() {
        let tree = parse("a { width: calc(var(--x) + 1px); color: rgb(1, 2, 3); @apply(--m); top: 0; }");
        assert_eq!(
            serialize(&tree, false),
            "a {\n  color: rgb(1, 2, 3); top: 0;\n}\n\n"
        );
    }

    #[test]
    fn mixin_parents_emit_their_own_text() {
        let mut tree = parse("html { --m: { color: red; }; }");
        let html = tree.first_child(tree.root()).unwrap_or(tree.root());
        tree[html].css_text = "--m_-_color: red;".to_owned();
        assert_eq!(serialize(&tree, true), "html {\n  --m_-_color: red;\n}\n\n");
    }

    #[test]
    fn keyframes_are_never_stripped() {
        let tree = parse(
            "@media screen { @keyframes pulse { from { opacity: var(--o); } } a { b: var(--c); } }",
        );
        let out = serialize(&tree, false);
        assert!(out.contains("opacity: var(--o);"));
        assert!(!out.contains("var(--c)"));
        assert!(!out.contains("a {"));
    }
}
