//! CSS Syntax Module Level 3 — lightweight rule-tree parsing.
//! Spec: <https://www.w3.org/TR/css-syntax-3/>
//!
//! This crate builds a brace-nesting tree of rules from stylesheet text, keeps
//! the raw text of every rule body so it can be rewritten in place, walks the
//! tree by rule classification, and serializes it back to CSS text.
//!
//! Declarations inside rule bodies are split with the `cssparser` tokenizer so
//! that semicolons inside strings, functions, and blocks never split an item.

#![forbid(unsafe_code)]

pub mod declarations;
mod parser;
mod rule;
mod serializer;
mod walker;

pub use declarations::{
    DeclarationEdit, DeclarationSpan, declaration_map, parse_declaration, rewrite_declarations,
    split_declarations,
};
pub use parser::{normalize_hex_escapes, parse, strip_comments_and_imports};
pub use rule::{Rule, RuleId, RuleTree, RuleType};
pub use serializer::{serialize, serialize_rule, strip_custom_syntax};
pub use walker::{media_condition, walk};

pub use css_media_queries::MediaMatcher;
