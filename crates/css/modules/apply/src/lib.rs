//! CSS `@apply` mixins: custom-property block resolution.
//!
//! A custom property whose value is a declaration block is a *mixin*:
//!
//! ```css
//! html { --toolbar: { color: red; padding: 2px; }; }
//! .bar { @apply --toolbar; }
//! ```
//!
//! Resolution rewrites the definition into one namespaced custom property per
//! sub-property and every application into `var()` reads of those properties:
//!
//! ```css
//! html { --toolbar_-_color: red; --toolbar_-_padding: 2px; }
//! .bar { color: var(--toolbar_-_color); padding: var(--toolbar_-_padding); }
//! ```
//!
//! All shared state (the mixin table, per-template version counters, the
//! settle queue, and the invalidation hook) lives in a [`ResolutionContext`].

#![forbid(unsafe_code)]

mod context;
mod layered;
mod resolver;
mod table;
mod versions;

pub use context::ResolutionContext;
pub use layered::LayeredMap;
pub use resolver::{ApplyStatement, InitialValueProbe, KeywordProbe, Resolver, parse_apply};
pub use table::{MixinEntry, MixinTable};
pub use versions::{Revision, TemplateState, TemplateVersions};

/// Joins a mixin name and one of its sub-properties: `--mixin_-_color`.
pub const MIXIN_SEPARATOR: &str = "_-_";

/// Value substituted for `inherit` inside a mixin block.
pub const INHERIT_PLACEHOLDER: &str = "apply-shim-inherit";

/// Namespaced custom property holding sub-property `property` of `mixin`.
#[inline]
pub fn namespaced_property(mixin: &str, property: &str) -> String {
    [mixin, MIXIN_SEPARATOR, property].concat()
}

/// Cheap check for shim syntax: an `@apply` statement or a custom-property
/// declaration.
pub fn detect_mixin_usage(text: &str) -> bool {
    has_apply(text) || has_custom_property_declaration(text)
}

fn has_apply(text: &str) -> bool {
    text.match_indices("@apply").any(|(pos, _)| {
        text.get(..pos)
            .and_then(|head| head.chars().next_back())
            .is_none_or(|previous| !(previous.is_alphanumeric() || previous == '_'))
    })
}

fn has_custom_property_declaration(text: &str) -> bool {
    text.match_indices("--").any(|(pos, _)| {
        let boundary = text
            .get(..pos)
            .and_then(|head| head.chars().next_back())
            .is_none_or(|previous| matches!(previous, ';' | '{') || previous.is_whitespace());
        if !boundary {
            return false;
        }
        let after = text.get(pos + 2..).unwrap_or_default();
        let name_len = after
            .find(|ch: char| !(ch.is_alphanumeric() || ch == '-' || ch == '_'))
            .unwrap_or(after.len());
        let Some(colon) = after.get(name_len..).map(str::trim_start) else {
            return false;
        };
        colon
            .strip_prefix(':')
            .map(str::trim_start)
            .and_then(|value| value.chars().next())
            .is_some_and(|first| first != ';' && first != '}')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_apply_and_custom_properties() {
        assert!(detect_mixin_usage(".a { @apply --m; }"));
        assert!(detect_mixin_usage("@apply(--m)"));
        assert!(detect_mixin_usage("html { --a: 1px; }"));
        assert!(detect_mixin_usage("html{--m:{color:red}}"));
        assert!(!detect_mixin_usage(".a { color: var(--x); }"));
        assert!(!detect_mixin_usage("x@apply"));
        assert!(!detect_mixin_usage(".a { color: red; }"));
    }

    #[test]
    fn builds_namespaced_names() {
        assert_eq!(namespaced_property("--m", "color"), "--m_-_color");
    }
}
