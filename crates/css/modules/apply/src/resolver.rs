//! Custom-property capture and `@apply` expansion.

use crate::context::ResolutionContext;
use crate::layered::LayeredMap;
use crate::{INHERIT_PLACEHOLDER, namespaced_property};
use css_syntax::{
    DeclarationEdit, RuleId, RuleTree, declaration_map, parse_declaration, rewrite_declarations,
    split_declarations,
};
use css_variables::{
    CustomPropertyValue, custom_property_declaration, has_important, referenced_names,
    split_important, strip_important,
};
use indexmap::IndexMap;
use log::{debug, trace};
use tracing::info_span;

/// Source of initial values for properties declared as `initial` inside a
/// mixin block.
pub trait InitialValueProbe {
    /// The environment's initial value for `property`.
    fn initial_value(&mut self, property: &str) -> String;
}

/// Probe that keeps the `initial` keyword as is.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordProbe;

impl InitialValueProbe for KeywordProbe {
    #[inline]
    fn initial_value(&mut self, _property: &str) -> String {
        "initial".to_owned()
    }
}

/// A parsed `@apply --name;`, `@apply(--name)` or `@apply --name !important`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyStatement<'text> {
    pub name: &'text str,
    pub important: bool,
}

/// Recognize an `@apply` declaration item (without its `;`).
pub fn parse_apply(item: &str) -> Option<ApplyStatement<'_>> {
    let rest = item.trim().strip_prefix("@apply")?;
    if !rest.starts_with(|ch: char| ch.is_whitespace() || ch == '(') {
        return None;
    }
    let (body, important) = split_important(rest);
    let name = match body.strip_prefix('(') {
        Some(inner) => inner.strip_suffix(')')?,
        None => body,
    }
    .trim();
    if name.is_empty() {
        return None;
    }
    Some(ApplyStatement { name, important })
}

/// Rewrites rule bodies against a [`ResolutionContext`].
pub struct Resolver<'ctx> {
    context: &'ctx mut ResolutionContext,
    probe: &'ctx mut dyn InitialValueProbe,
}

impl<'ctx> Resolver<'ctx> {
    #[inline]
    pub fn new(context: &'ctx mut ResolutionContext, probe: &'ctx mut dyn InitialValueProbe) -> Self {
        Self { context, probe }
    }

    /// Resolve every style rule of `tree`, recording `scope` as the dependent
    /// of each applied mixin.
    ///
    /// Media queries are not honored here; every style rule is resolved.
    pub fn transform_rules(&mut self, tree: &mut RuleTree, scope: Option<&str>) {
        let _span = info_span!("apply.transform_rules").entered();
        self.context.set_current_scope(scope);
        let rules = tree.style_rules(None);
        for rule in &rules {
            self.transform_rule(tree, *rule);
        }
        self.context.set_current_scope(None);
        trace!("resolved {} style rules for scope {scope:?}", rules.len());
    }

    /// Recompute `rule`'s text from its parsed text, then retarget `:root`
    /// to `:host > *`.
    pub fn transform_rule(&mut self, tree: &mut RuleTree, rule: RuleId) {
        let parsed = tree[rule].parsed_css_text.clone();
        let resolved = self.transform_css_text(tree, Some(rule), &parsed);
        let node = &mut tree[rule];
        node.css_text = resolved;
        if node.selector == ":root" {
            node.selector = ":host > *".to_owned();
        }
    }

    /// Resolve a body text: capture custom properties, then expand `@apply`.
    ///
    /// `rule`, when given, locates earlier rules with the same selector whose
    /// declarations act as overrides for applied mixins.
    pub fn transform_css_text(&mut self, tree: &RuleTree, rule: Option<RuleId>, text: &str) -> String {
        let captured = rewrite_declarations(text, |_, item| match custom_property_declaration(item) {
            Some((name, CustomPropertyValue::Block(body))) => {
                DeclarationEdit::Replace(self.register_mixin(tree, rule, name, body, None))
            }
            Some((name, CustomPropertyValue::Plain(value))) => {
                let Some(mixin) = self.applied_through_var(value) else {
                    return DeclarationEdit::Keep;
                };
                let body = format!("@apply {mixin};");
                DeclarationEdit::Replace(self.register_mixin(tree, rule, name, &body, Some(item)))
            }
            None => DeclarationEdit::Keep,
        });
        self.expand_applies(tree, rule, &captured)
    }

    /// First mixin referenced through `var()` in `value`, fallbacks included.
    fn applied_through_var(&self, value: &str) -> Option<String> {
        referenced_names(value)
            .into_iter()
            .find(|name| self.context.table().contains(name))
            .map(str::to_owned)
    }

    /// Register `name` with the declarations of `body` and return the
    /// namespaced declarations replacing the definition.
    fn register_mixin(
        &mut self,
        tree: &RuleTree,
        rule: Option<RuleId>,
        name: &str,
        body: &str,
        original: Option<&str>,
    ) -> String {
        let expanded = self.expand_applies(tree, rule, body);
        let values = self.mixin_values(&expanded);
        let previous = self
            .context
            .table()
            .get(name)
            .map(|entry| entry.properties.clone());

        let layered = LayeredMap::new(&values, previous.as_ref());
        let lines: Vec<String> = layered
            .keys()
            .map(|key| {
                let value = values.get(key).map_or("initial", String::as_str);
                format!("{}: {value}", namespaced_property(name, key))
            })
            .collect();
        let changed = previous.as_ref().is_some_and(|old| {
            old.len() != values.len() || old.iter().any(|(key, value)| values.get(key) != Some(value))
        });
        debug!(
            "registering mixin {name} with {} properties (changed: {changed})",
            values.len()
        );

        let current = self.context.current_scope().map(str::to_owned);
        if changed {
            let dependents: Vec<String> = self
                .context
                .table()
                .get(name)
                .map(|entry| entry.dependents.iter().cloned().collect())
                .unwrap_or_default();
            for dependent in dependents {
                if current.as_deref() != Some(dependent.as_str()) {
                    self.context.invalidate(&dependent);
                }
            }
        }
        let _previous = self.context.table_mut().replace_properties(name, values);
        if let Some(owner) = current {
            self.context.table_mut().get_or_register(name).dependents.insert(owner);
        }

        let mut out = String::new();
        if let Some(declaration) = original {
            out.push_str(declaration);
            out.push(';');
            if !lines.is_empty() {
                out.push(' ');
            }
        }
        if !lines.is_empty() {
            out.push_str(&lines.join("; "));
            out.push(';');
        }
        out
    }

    /// Sub-property map of an expanded mixin body.
    ///
    /// `initial` asks the probe for the property's initial value, and
    /// `inherit` becomes a placeholder that is never a valid value.
    fn mixin_values(&mut self, body: &str) -> IndexMap<String, String> {
        let mut values = IndexMap::new();
        for span in split_declarations(body) {
            let Some((key, value)) = parse_declaration(span.item(body)) else {
                continue;
            };
            let resolved = match value {
                "initial" => self.probe.initial_value(key),
                "inherit" => INHERIT_PLACEHOLDER.to_owned(),
                other => other.to_owned(),
            };
            values.insert(key.to_owned(), resolved);
        }
        values
    }

    /// Replace every `@apply` item of `text` with `var()` reads of the
    /// mixin's namespaced properties.
    fn expand_applies(&mut self, tree: &RuleTree, rule: Option<RuleId>, text: &str) -> String {
        rewrite_declarations(text, |before, item| {
            parse_apply(item).map_or(DeclarationEdit::Keep, |statement| {
                DeclarationEdit::Replace(self.expand_apply(tree, rule, before, statement))
            })
        })
    }

    fn expand_apply(
        &mut self,
        tree: &RuleTree,
        rule: Option<RuleId>,
        before: &str,
        statement: ApplyStatement<'_>,
    ) -> String {
        let name = statement.name;
        let scope = self.context.current_scope().map(str::to_owned);
        let known = self.context.table().contains(name);
        let entry = self.context.table_mut().get_or_register(name);
        if !known {
            debug!("@apply of unknown mixin {name}; registered empty");
        }
        if let Some(scope) = scope {
            entry.dependents.insert(scope);
        }
        let properties = entry.properties.clone();

        let contextual = rule.map(|id| contextual_overrides(tree, id)).unwrap_or_default();
        let local = declaration_map(before);
        let overrides = LayeredMap::new(&local, Some(&contextual));

        let lines: Vec<String> = properties
            .iter()
            .map(|(key, value)| {
                let namespaced = namespaced_property(name, key);
                let mut line = format!("{key}: var({namespaced}");
                if let Some(fallback) = overrides.lookup(&[key.as_str(), namespaced.as_str()]) {
                    let fallback = strip_important(fallback);
                    let fallback = fallback.trim();
                    if !fallback.is_empty() {
                        line.push_str(", ");
                        line.push_str(fallback);
                    }
                }
                line.push(')');
                if has_important(value) || statement.important {
                    line.push_str(" !important");
                }
                line
            })
            .collect();
        trace!("@apply {name} expanded to {} declarations", lines.len());
        if lines.is_empty() {
            String::new()
        } else {
            format!("{};", lines.join("; "))
        }
    }
}

/// Declarations of style rules that precede `rule` and share its selector.
/// Later rules override earlier ones.
fn contextual_overrides(tree: &RuleTree, rule: RuleId) -> IndexMap<String, String> {
    let selector = &tree[rule].parsed_selector;
    let mut overrides = IndexMap::new();
    for candidate in tree.style_rules(None) {
        if candidate == rule {
            break;
        }
        let node = &tree[candidate];
        if node.parsed_selector == *selector {
            overrides.extend(declaration_map(&node.parsed_css_text));
        }
    }
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_apply_forms() {
        assert_eq!(
            parse_apply("@apply --m"),
            Some(ApplyStatement {
                name: "--m",
                important: false
            })
        );
        assert_eq!(
            parse_apply("@apply(--m)"),
            Some(ApplyStatement {
                name: "--m",
                important: false
            })
        );
        assert_eq!(
            parse_apply("@apply --m !important"),
            Some(ApplyStatement {
                name: "--m",
                important: true
            })
        );
        assert_eq!(parse_apply("@apply(--m"), None);
        assert_eq!(parse_apply("@applyx --m"), None);
        assert_eq!(parse_apply("@apply"), None);
        assert_eq!(parse_apply("color: red"), None);
    }

    #[test]
    fn expands_in_plain_text_without_a_tree() {
        let mut context = ResolutionContext::new();
        let mut probe = KeywordProbe;
        let tree = css_syntax::parse("");
        let mut resolver = Resolver::new(&mut context, &mut probe);
        let defined = resolver.transform_css_text(&tree, None, "--m: { color: red; top: initial }");
        assert_eq!(defined, "--m_-_color: red; --m_-_top: initial;");
        let applied = resolver.transform_css_text(&tree, None, "color: blue; @apply --m;");
        assert_eq!(
            applied,
            "color: blue; color: var(--m_-_color, blue); top: var(--m_-_top);"
        );
    }

    #[test]
    fn inherit_becomes_placeholder() {
        let mut context = ResolutionContext::new();
        let mut probe = KeywordProbe;
        let tree = css_syntax::parse("");
        let mut resolver = Resolver::new(&mut context, &mut probe);
        let defined = resolver.transform_css_text(&tree, None, "--m: { color: inherit }");
        assert_eq!(defined, "--m_-_color: apply-shim-inherit;");
    }
}
