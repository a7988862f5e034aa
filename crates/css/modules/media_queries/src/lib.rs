//! Media Queries Level 4 — evaluation of `@media` conditions.
//! Spec: <https://www.w3.org/TR/mediaqueries-4/>
//!
//! Only the subset needed to gate dead `@media` blocks is implemented: media
//! types, the `not`/`only` modifiers, `and` chains, and the dimensional
//! features `width`/`height` (with `min-`/`max-` prefixes) plus `orientation`.

#![forbid(unsafe_code)]

use cssparser::{ParseError, Parser, ParserInput, Token};
use log::debug;
use serde::Deserialize;

/// Parse errors produced while reading a media query list.
type MediaParseError<'i> = ParseError<'i, ()>;

/// Decides whether a media condition currently applies.
///
/// The condition is the raw text following `@media ` in a rule prelude.
pub trait MediaMatcher {
    /// Return true when `condition` matches the current environment.
    fn matches(&self, condition: &str) -> bool;
}

impl<F> MediaMatcher for F
where
    F: Fn(&str) -> bool,
{
    #[inline]
    fn matches(&self, condition: &str) -> bool {
        self(condition)
    }
}

/// Static description of the rendering environment media queries are
/// evaluated against.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportMedia {
    /// Viewport width in CSS pixels.
    pub width_px: f32,
    /// Viewport height in CSS pixels.
    pub height_px: f32,
    /// Media type, such as `screen` or `print`.
    pub media_type: String,
    /// Root font size used to resolve `em`/`rem` lengths.
    pub root_font_size_px: f32,
}

impl Default for ViewportMedia {
    #[inline]
    fn default() -> Self {
        Self {
            width_px: 1024.0,
            height_px: 768.0,
            media_type: "screen".to_owned(),
            root_font_size_px: 16.0,
        }
    }
}

impl ViewportMedia {
    /// Create a screen environment of the given size.
    #[inline]
    pub fn screen(width_px: f32, height_px: f32) -> Self {
        Self {
            width_px,
            height_px,
            ..Self::default()
        }
    }
}

impl MediaMatcher for ViewportMedia {
    #[inline]
    fn matches(&self, condition: &str) -> bool {
        evaluate_media_query_list(condition, self)
    }
}

/// Evaluate a comma separated media query list.
///
/// An empty list matches. A list that fails to parse does not match, the same
/// way a browser treats an unknown query as `not all`.
pub fn evaluate_media_query_list(text: &str, env: &ViewportMedia) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    let results = parser.parse_comma_separated(|query| parse_media_query(query, env));
    results.map_or_else(
        |err| {
            debug!("media query `{text}` did not parse: {err:?}");
            false
        },
        |matches| matches.iter().any(|matched| *matched),
    )
}

/// Parse one `[not|only]? <type>? (and <condition>)*` query and evaluate it.
fn parse_media_query<'i>(
    input: &mut Parser<'i, '_>,
    env: &ViewportMedia,
) -> Result<bool, MediaParseError<'i>> {
    let mut negated = false;
    let mut matched = true;
    let leading = input
        .try_parse(|parser| parser.expect_ident_cloned().map(|ident| ident.to_ascii_lowercase()));
    match leading {
        Ok(first) => {
            let media_type = if first == "not" || first == "only" {
                negated = first == "not";
                input
                    .try_parse(|parser| {
                        parser
                            .expect_ident_cloned()
                            .map(|ident| ident.to_ascii_lowercase())
                    })
                    .ok()
            } else {
                Some(first)
            };
            if let Some(kind) = media_type {
                matched = kind == "all" || kind == env.media_type;
            } else {
                matched = parse_condition(input, env)?;
            }
        }
        Err(_) => {
            matched &= parse_condition(input, env)?;
        }
    }
    while !input.is_exhausted() {
        input.expect_ident_matching("and")?;
        let condition = parse_condition(input, env)?;
        matched = matched && condition;
    }
    Ok(matched != negated)
}

/// Parse a parenthesized `(feature[: value])` and evaluate it.
fn parse_condition<'i>(
    input: &mut Parser<'i, '_>,
    env: &ViewportMedia,
) -> Result<bool, MediaParseError<'i>> {
    input.expect_parenthesis_block()?;
    input.parse_nested_block(|block| parse_feature(block, env))
}

fn parse_feature<'i>(
    input: &mut Parser<'i, '_>,
    env: &ViewportMedia,
) -> Result<bool, MediaParseError<'i>> {
    let name = input.expect_ident_cloned()?.to_ascii_lowercase();
    if input.is_exhausted() {
        return Ok(match name.as_str() {
            "width" => env.width_px > 0.0,
            "height" => env.height_px > 0.0,
            "orientation" | "color" => true,
            _ => false,
        });
    }
    input.expect_colon()?;
    if name == "orientation" {
        let wanted = input.expect_ident_cloned()?.to_ascii_lowercase();
        let portrait = env.height_px >= env.width_px;
        return Ok(match wanted.as_str() {
            "portrait" => portrait,
            "landscape" => !portrait,
            _ => false,
        });
    }
    let (range, dimension) = match name.split_once('-') {
        Some(("min", rest)) => (Range::Min, rest),
        Some(("max", rest)) => (Range::Max, rest),
        _ => (Range::Exact, name.as_str()),
    };
    let actual = match dimension {
        "width" => env.width_px,
        "height" => env.height_px,
        _ => return Err(input.new_custom_error(())),
    };
    let wanted = parse_length_px(input, env)?;
    Ok(match range {
        Range::Min => actual >= wanted,
        Range::Max => actual <= wanted,
        Range::Exact => (actual - wanted).abs() < f32::EPSILON,
    })
}

#[derive(Clone, Copy, Debug)]
enum Range {
    Min,
    Max,
    Exact,
}

/// Parse a `<length>` in px/em/rem (or unitless zero) and return pixels.
fn parse_length_px<'i>(
    input: &mut Parser<'i, '_>,
    env: &ViewportMedia,
) -> Result<f32, MediaParseError<'i>> {
    let token = input.next()?.clone();
    match token {
        Token::Dimension { value, unit, .. } => match unit.to_ascii_lowercase().as_str() {
            "px" => Ok(value),
            "em" | "rem" => Ok(value * env.root_font_size_px),
            "vw" => Ok(value * env.width_px / 100.0),
            "vh" => Ok(value * env.height_px / 100.0),
            _ => Err(input.new_custom_error(())),
        },
        Token::Number { value, .. } if value == 0.0 => Ok(0.0),
        _ => Err(input.new_custom_error(())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _log_init: Result<(), _> = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn min_width_gates_on_viewport() {
        init();
        let env = ViewportMedia::screen(800.0, 600.0);
        assert!(env.matches("(min-width: 600px)"));
        assert!(!env.matches("(min-width: 999999px)"));
        assert!(env.matches("(max-width: 50em)"));
    }

    #[test]
    fn media_types_and_modifiers() {
        init();
        let env = ViewportMedia::default();
        assert!(env.matches("screen"));
        assert!(env.matches("all and (min-width: 10px)"));
        assert!(!env.matches("print"));
        assert!(env.matches("not print"));
        assert!(env.matches("only screen and (orientation: landscape)"));
        assert!(!env.matches("screen and (orientation: portrait)"));
    }

    #[test]
    fn lists_match_when_any_query_matches() {
        init();
        let env = ViewportMedia::screen(320.0, 640.0);
        assert!(env.matches("print, (max-width: 400px)"));
        assert!(!env.matches("print, (min-width: 400px)"));
    }

    #[test]
    fn invalid_queries_do_not_match() {
        init();
        let env = ViewportMedia::default();
        assert!(!env.matches("(min-width: banana)"));
        assert!(!env.matches("(frobnicate: 3px)"));
        assert!(env.matches(""));
    }

    #[test]
    fn closures_act_as_matchers() {
        let never = |_: &str| false;
        assert!(!never.matches("screen"));
    }
}
