//! Brace-counting stylesheet parser.

use crate::rule::{Rule, RuleId, RuleTree, RuleType};
use core::iter;
use log::{trace, warn};

/// Parse stylesheet text into a [`RuleTree`].
///
/// Comments and `@import` statements are stripped first. The tree is built in a
/// single left-to-right pass that counts braces; rules still open when the
/// input ends are closed at the end of the text. A `}` with nothing open is
/// ignored.
pub fn parse(text: &str) -> RuleTree {
    let source = strip_comments_and_imports(text);
    let mut tree = RuleTree::with_source(source);
    let root = tree.root();
    let mut current = root;
    let mut positions: Vec<(usize, u8)> = Vec::new();
    let mut stray = Vec::new();
    for (index, byte) in tree.source().bytes().enumerate() {
        if byte == b'{' || byte == b'}' {
            positions.push((index, byte));
        }
    }
    for (index, byte) in positions {
        if byte == b'{' {
            current = tree.push_child(
                current,
                Rule {
                    start: index + 1,
                    ..Rule::default()
                },
            );
        } else if current == root {
            warn!("ignoring unmatched `}}` at byte {index}");
            stray.push(index);
        } else {
            let rule = &mut tree[current];
            rule.end = index + 1;
            rule.explicitly_closed = true;
            current = tree.parent(current).unwrap_or(root);
        }
    }
    let len = tree.source().len();
    let mut unclosed = current;
    while unclosed != root {
        warn!("rule opened at byte {} was never closed", tree[unclosed].start);
        tree[unclosed].end = len;
        unclosed = tree.parent(unclosed).unwrap_or(root);
    }
    annotate(&mut tree, root);
    if !stray.is_empty() {
        drop_stray_braces(&mut tree, &stray);
    }
    trace!("parsed {} rules", tree.len().saturating_sub(1));
    tree
}

/// Rebuild the root body without the unmatched `}` bytes at `stray`.
fn drop_stray_braces(tree: &mut RuleTree, stray: &[usize]) {
    let root = tree.root();
    let mut body = String::with_capacity(tree.source().len());
    let mut from = 0;
    for &index in stray {
        body.push_str(slice(tree.source(), from, index));
        from = index + 1;
    }
    body.push_str(slice(tree.source(), from, tree.source().len()));
    let body = body.trim().to_owned();
    let node = &mut tree[root];
    node.css_text.clone_from(&body);
    node.parsed_css_text = body;
}

/// Fill in text, selector and classification for `id` and its descendants.
fn annotate(tree: &mut RuleTree, id: RuleId) {
    let mut stack = vec![id];
    while let Some(next) = stack.pop() {
        annotate_one(tree, next);
        let mut children: Vec<RuleId> = tree.children(next).collect();
        children.reverse();
        stack.extend(children);
    }
}

fn annotate_one(tree: &mut RuleTree, id: RuleId) {
    let body = {
        let rule = &tree[id];
        slice(tree.source(), rule.start, rule.body_end()).trim().to_owned()
    };
    let selector = tree.parent(id).map(|parent| {
        let prelude_start = tree
            .previous(id)
            .map_or_else(|| tree[parent].start, |previous| tree[previous].end);
        let prelude = slice(tree.source(), prelude_start, tree[id].start.saturating_sub(1));
        normalize_selector(prelude)
    });
    let rule = &mut tree[id];
    rule.css_text.clone_from(&body);
    rule.parsed_css_text = body;
    let Some(selector) = selector else {
        return;
    };
    rule.at_rule = selector.starts_with('@');
    rule.rule_type = classify(&selector);
    if rule.rule_type == RuleType::Keyframes {
        rule.keyframes_name = selector.split_whitespace().last().map(str::to_owned);
    }
    rule.selector.clone_from(&selector);
    rule.parsed_selector = selector;
}

fn slice(source: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    source.get(start..end).unwrap_or_default()
}

/// Normalize selector text: pad hex escapes, collapse whitespace, and keep only
/// the text after the last `;` (anything before it belongs to a preceding
/// declaration).
fn normalize_selector(prelude: &str) -> String {
    let padded = normalize_hex_escapes(prelude);
    let collapsed = padded.split_whitespace().collect::<Vec<_>>().join(" ");
    let tail = collapsed
        .rsplit_once(';')
        .map_or(collapsed.as_str(), |(_, after)| after);
    tail.trim().to_owned()
}

fn classify(selector: &str) -> RuleType {
    if let Some(at_rule) = selector.strip_prefix('@') {
        if selector.starts_with("@media") {
            return RuleType::Media;
        }
        let keyword = at_rule.split_whitespace().next().unwrap_or_default();
        if keyword.contains("keyframes") {
            return RuleType::Keyframes;
        }
        return RuleType::Inert;
    }
    if selector.starts_with("--") {
        RuleType::MixinDefinition
    } else {
        RuleType::Style
    }
}

/// Pad short hexadecimal escapes followed by whitespace to six digits, so
/// `\41 ` becomes `\000041 `.
pub fn normalize_hex_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(slash) = rest.find('\\') {
        let (head, tail) = rest.split_at(slash);
        out.push_str(head);
        let after = tail.get(1..).unwrap_or_default();
        let digits = after
            .bytes()
            .take(6)
            .take_while(u8::is_ascii_hexdigit)
            .count();
        let terminator = after.get(digits..).and_then(|remaining| remaining.chars().next());
        match terminator {
            Some(space) if digits > 0 && space.is_whitespace() => {
                out.push('\\');
                out.extend(iter::repeat_n('0', 6 - digits));
                out.push_str(after.get(..digits).unwrap_or_default());
                out.push(' ');
                rest = after.get(digits + space.len_utf8()..).unwrap_or_default();
            }
            _ => {
                out.push('\\');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Remove `/* ... */` comments and `@import ...;` statements.
///
/// An unterminated comment, or an `@import` without a terminating `;`, is left
/// in place.
pub fn strip_comments_and_imports(text: &str) -> String {
    let mut without_comments = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("/*") {
        let Some(close) = rest.get(open + 2..).and_then(|body| body.find("*/")) else {
            break;
        };
        without_comments.push_str(rest.get(..open).unwrap_or_default());
        rest = rest.get(open + 2 + close + 2..).unwrap_or_default();
    }
    without_comments.push_str(rest);

    let mut out = String::with_capacity(without_comments.len());
    let mut remaining = without_comments.as_str();
    while let Some(at) = remaining.to_ascii_lowercase().find("@import") {
        let Some(semicolon) = remaining.get(at..).and_then(|tail| tail.find(';')) else {
            break;
        };
        out.push_str(remaining.get(..at).unwrap_or_default());
        remaining = remaining.get(at + semicolon + 1..).unwrap_or_default();
    }
    out.push_str(remaining);
    out
}
