//! Declaration splitting for rule bodies.
//!
//! Items are separated by top-level `;`. A top-level `{}` block also ends its
//! item (custom-property blocks may omit the trailing semicolon); a directly
//! following `;` is folded into the same item. Strings, functions, and nested
//! blocks are skipped whole by the tokenizer.

use cssparser::{ParseError, Parser, ParserInput, Token};
use indexmap::IndexMap;

/// Byte range of one declaration item inside a body text.
///
/// `start..end` is the item itself (leading whitespace included, terminator
/// excluded). `end..terminator_end` is the `;` that closed it, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeclarationSpan {
    pub start: usize,
    pub end: usize,
    pub terminator_end: usize,
}

impl DeclarationSpan {
    /// The item text with surrounding whitespace trimmed.
    #[inline]
    pub fn item<'text>(&self, text: &'text str) -> &'text str {
        text.get(self.start..self.end).unwrap_or_default().trim()
    }
}

/// Split `text` into declaration spans. Spans cover the text contiguously.
pub fn split_declarations(text: &str) -> Vec<DeclarationSpan> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    let mut spans = Vec::new();
    let mut item_start = 0;
    loop {
        let before = parser.position().byte_index();
        let Ok(token) = parser.next_including_whitespace_and_comments() else {
            break;
        };
        let ends_item = matches!(token, Token::Semicolon);
        let opens_block = matches!(token, Token::CurlyBracketBlock);
        let opens_nested = matches!(
            token,
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock
        );
        if opens_nested {
            skip_nested_block(&mut parser);
        } else if ends_item {
            let terminator_end = parser.position().byte_index();
            spans.push(DeclarationSpan {
                start: item_start,
                end: before,
                terminator_end,
            });
            item_start = terminator_end;
        } else if opens_block {
            skip_nested_block(&mut parser);
            let end = parser.position().byte_index();
            let terminator = parser.try_parse(|next| next.expect_semicolon());
            let terminator_end = if terminator.is_ok() {
                parser.position().byte_index()
            } else {
                end
            };
            spans.push(DeclarationSpan {
                start: item_start,
                end,
                terminator_end,
            });
            item_start = terminator_end;
        }
    }
    if item_start < text.len() {
        spans.push(DeclarationSpan {
            start: item_start,
            end: text.len(),
            terminator_end: text.len(),
        });
    }
    spans
}

/// Consume the block whose opening token was just returned.
fn skip_nested_block(parser: &mut Parser<'_, '_>) {
    let _block: Result<(), _> = parser.parse_nested_block(|block| {
        while block.next_including_whitespace_and_comments().is_ok() {}
        Ok::<_, ParseError<'_, ()>>(())
    });
}

/// What to do with one declaration item during [`rewrite_declarations`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclarationEdit {
    Keep,
    Remove,
    /// Replace the item and its terminator. The item's leading whitespace is kept.
    Replace(String),
}

/// Rebuild `text`, letting `edit` decide the fate of every non-empty item.
///
/// The callback receives the output produced so far and the trimmed item.
pub fn rewrite_declarations<F>(text: &str, mut edit: F) -> String
where
    F: FnMut(&str, &str) -> DeclarationEdit,
{
    let mut out = String::with_capacity(text.len());
    for span in split_declarations(text) {
        let raw = text.get(span.start..span.terminator_end).unwrap_or_default();
        let item = span.item(text);
        if item.is_empty() {
            out.push_str(raw);
            continue;
        }
        match edit(&out, item) {
            DeclarationEdit::Keep => out.push_str(raw),
            DeclarationEdit::Remove => {}
            DeclarationEdit::Replace(replacement) => {
                let leading = raw.len() - raw.trim_start().len();
                out.push_str(raw.get(..leading).unwrap_or_default());
                out.push_str(&replacement);
            }
        }
    }
    out
}

/// Split a declaration item into its trimmed name and value at the first `:`.
#[inline]
pub fn parse_declaration(item: &str) -> Option<(&str, &str)> {
    let (name, value) = item.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

/// Collect `name: value` pairs from a body text. Later declarations win, but
/// keep the position of the first occurrence.
pub fn declaration_map(text: &str) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    for span in split_declarations(text) {
        if let Some((name, value)) = parse_declaration(span.item(text)) {
            map.insert(name.to_owned(), value.to_owned());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(text: &str) -> Vec<&str> {
        split_declarations(text)
            .iter()
            .map(|span| span.item(text))
            .filter(|item| !item.is_empty())
            .collect()
    }

    #[test]
    fn splits_on_top_level_semicolons() {
        assert_eq!(items("color: red; size: 2px"), vec!["color: red", "size: 2px"]);
        assert_eq!(
            items(r#"content: "a;b"; background: url(data:x;y); z: calc(1px + (2px))"#),
            vec![
                r#"content: "a;b""#,
                "background: url(data:x;y)",
                "z: calc(1px + (2px))"
            ]
        );
    }

    #[test]
    fn functions_followed_by_semicolons_stay_whole() {
        assert_eq!(
            items("a: rgb(1,2,3); b: 0"),
            vec!["a: rgb(1,2,3)", "b: 0"]
        );
        assert_eq!(
            items("grid-area: [a] 1 / [b] 2; width: calc(var(--x) + (1px)); top: 0;"),
            vec!["grid-area: [a] 1 / [b] 2", "width: calc(var(--x) + (1px))", "top: 0"]
        );
        assert_eq!(items("@apply(--m); color: red"), vec!["@apply(--m)", "color: red"]);
        let text = "x: f(a; b); y: 1";
        let spans = split_declarations(text);
        assert_eq!(text.get(spans[0].end..spans[0].terminator_end), Some(";"));
    }

    #[test]
    fn blocks_end_their_item() {
        let text = "--a: { x: 1; y: 2 }\n  --b: 3px; --c: { z: w };\ncolor: red;";
        assert_eq!(
            items(text),
            vec!["--a: { x: 1; y: 2 }", "--b: 3px", "--c: { z: w }", "color: red"]
        );
        let spans = split_declarations(text);
        let last_block = spans[2];
        assert_eq!(text.get(last_block.end..last_block.terminator_end), Some(";"));
    }

    #[test]
    fn rewriting_preserves_untouched_text() {
        let text = "a: 1;\n  b: 2;\n  c: 3";
        let out = rewrite_declarations(text, |_, item| match item {
            "b: 2" => DeclarationEdit::Remove,
            "c: 3" => DeclarationEdit::Replace("c: 4;".to_owned()),
            _ => DeclarationEdit::Keep,
        });
        assert_eq!(out, "a: 1;\n  c: 4;");
    }

    #[test]
    fn rewriting_sees_previous_output() {
        let mut seen = Vec::new();
        let _out: String = rewrite_declarations("a: 1; b: 2", |before, _| {
            seen.push(before.to_owned());
            DeclarationEdit::Keep
        });
        assert_eq!(seen, vec!["", "a: 1;"]);
    }

    #[test]
    fn maps_declarations_in_order() {
        let map = declaration_map("b: 1; a: url(x:y); b: 3; junk");
        let pairs: Vec<_> = map.iter().map(|(key, value)| (key.as_str(), value.as_str())).collect();
        assert_eq!(pairs, vec![("b", "3"), ("a", "url(x:y)")]);
    }
}
