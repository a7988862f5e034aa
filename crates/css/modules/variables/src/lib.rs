//! CSS Custom Properties for Cascading Variables Module Level 1 — CSS variables.
//! Spec: <https://www.w3.org/TR/css-variables-1/>
//!
//! Helpers for locating custom-property declarations (plain values and
//! `{}` blocks), scanning `var()` references with balanced parentheses, and
//! substituting them against a set of known custom properties.

#![forbid(unsafe_code)]

use core::hash::BuildHasher;
use css_syntax::parse_declaration;
use log::trace;
use std::collections::HashMap;

/// Alias used by helpers that operate on a set of custom properties.
/// Keys are property names (including the leading `--`); values are raw token strings.
pub type CustomProperties = HashMap<String, String>;

/// Extract custom properties (`--*`) from a declaration map.
///
/// This is a simple filter that keeps only entries whose property name begins with `--`.
/// It can be used on inline style maps or computed declaration maps to produce a
/// custom properties environment for `var()` resolution.
///
/// Spec: <https://www.w3.org/TR/css-variables-1/#custom-properties>
#[inline]
pub fn extract_custom_properties<S: BuildHasher>(
    declarations: &HashMap<String, String, S>,
) -> CustomProperties {
    declarations
        .iter()
        .filter(|(key, _)| key.starts_with("--"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// The value side of a custom-property declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomPropertyValue<'text> {
    /// `--name: value`
    Plain(&'text str),
    /// `--name: { body }`, holding the trimmed body between the braces.
    Block(&'text str),
}

/// Recognize a custom-property declaration item such as `--name: value` or
/// `--name: { color: red }`.
///
/// Returns `None` for ordinary declarations and for custom properties with an
/// empty name (`--: x`).
pub fn custom_property_declaration(item: &str) -> Option<(&str, CustomPropertyValue<'_>)> {
    let (name, value) = parse_declaration(item)?;
    if !name.starts_with("--") || name.len() == 2 {
        return None;
    }
    if name.contains(char::is_whitespace) {
        return None;
    }
    let block = value
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .map(str::trim);
    Some((
        name,
        block.map_or(CustomPropertyValue::Plain(value), CustomPropertyValue::Block),
    ))
}

/// Split a trailing `!important` from `value`, returning the trimmed remainder
/// and whether the flag was present.
#[inline]
pub fn split_important(value: &str) -> (&str, bool) {
    let trimmed = value.trim();
    if let Some(pos) = trimmed.rfind("!important")
        && let Some(prefix) = trimmed.get(..pos)
        && trimmed.get(pos + "!important".len()..).is_some_and(|tail| tail.trim().is_empty())
    {
        return (prefix.trim_end(), true);
    }
    (trimmed, false)
}

/// True when `value` carries an `!important` flag anywhere.
#[inline]
pub fn has_important(value: &str) -> bool {
    value.contains("!important")
}

/// Remove every `!important` flag (and the whitespace before it) from `value`.
pub fn strip_important(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find("!important") {
        out.push_str(rest.get(..pos).unwrap_or_default().trim_end());
        rest = rest.get(pos + "!important".len()..).unwrap_or_default();
    }
    out.push_str(rest);
    out
}

/// One `var(...)` occurrence inside a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarReference<'text> {
    /// Text before `var(`.
    pub prefix: &'text str,
    /// Trimmed first argument (normally `--name`).
    pub name: &'text str,
    /// Trimmed text after the first comma, if any.
    pub fallback: Option<&'text str>,
    /// Text after the closing parenthesis.
    pub rest: &'text str,
}

/// Find the first `var(` with a balanced closing parenthesis.
///
/// An unbalanced `var(` yields `None`, so callers leave the text untouched.
pub fn find_var_reference(text: &str) -> Option<VarReference<'_>> {
    let open = text.find("var(")?;
    let args_start = open + "var(".len();
    let mut depth = 1_usize;
    let mut close = None;
    for (offset, byte) in text.get(args_start..)?.bytes().enumerate() {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(args_start + offset);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        trace!("unbalanced var( in `{text}`");
        return None;
    };
    let args = text.get(args_start..close)?;
    let (name, fallback) = match args.split_once(',') {
        Some((first, second)) => (first.trim(), Some(second.trim())),
        None => (args.trim(), None),
    };
    Some(VarReference {
        prefix: text.get(..open)?,
        name,
        fallback,
        rest: text.get(close + 1..)?,
    })
}

/// Names referenced through `var()` in `text`, in textual order, including
/// references nested inside fallbacks.
pub fn referenced_names(text: &str) -> Vec<&str> {
    let mut names = Vec::new();
    collect_names(text, &mut names);
    names
}

fn collect_names<'text>(text: &'text str, names: &mut Vec<&'text str>) {
    let mut remaining = text;
    while let Some(reference) = find_var_reference(remaining) {
        if !reference.name.is_empty() {
            names.push(reference.name);
        }
        if let Some(fallback) = reference.fallback {
            collect_names(fallback, names);
        }
        remaining = reference.rest;
    }
}

/// Resolve `var()` functions within a value against the provided custom properties.
///
/// This implements a conservative subset:
/// - Supports `var(--name)` and `var(--name, fallback)`.
/// - Looks up `--name` first in `inherited` (parent) then in `current` if not found in parent.
///   This approximates inheritance behavior for custom properties.
/// - Performs recursive expansion to resolve nested `var()` inside referenced values or fallbacks.
/// - Basic cycle detection: if a variable references itself directly or indirectly, the reference
///   is treated as invalid; if a fallback is provided, it is used, otherwise the reference is
///   replaced with the empty string.
/// - Parentheses inside the argument list are balanced. If a `var(` has no closing `)`, the text
///   is preserved as-is.
///
/// Spec: <https://www.w3.org/TR/css-variables-1/#using-variables>
#[inline]
pub fn resolve_vars_in_value(
    value_text: &str,
    current: &CustomProperties,
    inherited: &CustomProperties,
) -> String {
    resolve_vars_internal(value_text, current, inherited, &mut Vec::new())
}

/// Internal recursive resolver that carries the resolution stack for cycle detection.
///
/// Spec: <https://www.w3.org/TR/css-variables-1/#cycles>
fn resolve_vars_internal(
    value_text: &str,
    current: &CustomProperties,
    inherited: &CustomProperties,
    stack: &mut Vec<String>,
) -> String {
    let Some(reference) = find_var_reference(value_text) else {
        return value_text.to_owned();
    };
    let replacement = resolve_single_var(&reference, current, inherited, stack);
    let resolved_tail = resolve_vars_internal(reference.rest, current, inherited, stack);
    [reference.prefix, &replacement, &resolved_tail].concat()
}

/// Resolve a single `var()` reference, possibly expanding nested vars.
///
/// Spec: <https://www.w3.org/TR/css-variables-1/#using-variables>
fn resolve_single_var(
    reference: &VarReference<'_>,
    current: &CustomProperties,
    inherited: &CustomProperties,
    stack: &mut Vec<String>,
) -> String {
    let use_fallback = |frames: &mut Vec<String>| {
        reference.fallback.map_or_else(String::new, |fallback_src| {
            resolve_vars_internal(fallback_src, current, inherited, frames)
        })
    };
    let name_text = reference.name;
    if !name_text.starts_with("--") {
        return use_fallback(stack);
    }

    // Choose value from inherited first, then current scope.
    let candidate_value = inherited.get(name_text).or_else(|| current.get(name_text));

    match candidate_value {
        Some(resolved_value) => {
            if stack.iter().any(|entry| entry == name_text) {
                return use_fallback(stack);
            }
            stack.push(name_text.to_owned());
            let expanded = resolve_vars_internal(resolved_value, current, inherited, stack);
            stack.pop();
            expanded
        }
        None => use_fallback(stack),
    }
}
