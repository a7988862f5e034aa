//! Classification-driven traversal of a [`RuleTree`].

use crate::rule::{RuleId, RuleTree, RuleType};
use css_media_queries::MediaMatcher;
use log::trace;

/// Visit `rule` and its descendants in source order.
///
/// - Style rules are passed to `on_style`.
/// - Keyframes rules are passed to `on_keyframes` when it is provided.
/// - Mixin definitions are skipped together with their descendants.
/// - With a `media` matcher, an `@media` rule whose condition does not match is
///   skipped together with its descendants.
///
/// Every other rule is descended into.
pub fn walk<'cb>(
    tree: &RuleTree,
    rule: RuleId,
    on_style: &mut (dyn FnMut(RuleId) + 'cb),
    mut on_keyframes: Option<&mut (dyn FnMut(RuleId) + 'cb)>,
    media: Option<&dyn MediaMatcher>,
) {
    let node = &tree[rule];
    let mut skip = false;
    if let Some(matcher) = media
        && node.rule_type == RuleType::Media
        && let Some(condition) = media_condition(&node.selector)
        && !matcher.matches(condition)
    {
        trace!("skipping `{}`: media does not match", node.selector);
        skip = true;
    }
    match node.rule_type {
        RuleType::Style => on_style(rule),
        RuleType::Keyframes => {
            if let Some(callback) = on_keyframes.as_deref_mut() {
                callback(rule);
            }
        }
        RuleType::MixinDefinition => skip = true,
        RuleType::Media | RuleType::Inert => {}
    }
    if skip {
        return;
    }
    for child in tree.children(rule) {
        walk(tree, child, on_style, on_keyframes.as_deref_mut(), media);
    }
}

/// The condition of an `@media` selector: the text after `@media` and one
/// whitespace character.
pub fn media_condition(selector: &str) -> Option<&str> {
    let rest = selector.strip_prefix("@media")?;
    let mut chars = rest.chars();
    let separator = chars.next()?;
    separator.is_whitespace().then_some(chars.as_str())
}

impl RuleTree {
    /// Ids of every style rule `walk` would report, in walk order.
    pub fn style_rules(&self, media: Option<&dyn MediaMatcher>) -> Vec<RuleId> {
        let mut found = Vec::new();
        walk(self, self.root(), &mut |id: RuleId| found.push(id), None, media);
        found
    }

    /// Ids of every keyframes rule reachable by `walk`.
    pub fn keyframes_rules(&self, media: Option<&dyn MediaMatcher>) -> Vec<RuleId> {
        let mut found = Vec::new();
        walk(
            self,
            self.root(),
            &mut |_: RuleId| {},
            Some(&mut |id: RuleId| found.push(id)),
            media,
        );
        found
    }
}
