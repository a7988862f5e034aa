//! Global shim flags supplied by the embedding environment.

use anyhow::{Context as _, Result};
use css_media_queries::ViewportMedia;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ShimSettings {
    /// Explicit native custom-property support; derived when absent.
    pub native_css: Option<bool>,
    pub native_shadow: bool,
    /// Global css-build marker. Overrides per-template markers.
    pub css_build: Option<String>,
    /// Turns every styling entry point into a no-op.
    pub disable_runtime: bool,
    pub shim_css_properties: bool,
    pub supports_custom_properties: bool,
    pub viewport: ViewportMedia,
}

impl Default for ShimSettings {
    fn default() -> Self {
        Self {
            native_css: None,
            native_shadow: true,
            css_build: None,
            disable_runtime: false,
            shim_css_properties: false,
            supports_custom_properties: true,
            viewport: ViewportMedia::default(),
        }
    }
}

impl ShimSettings {
    /// Whether custom properties reach the rendering surface untouched.
    #[inline]
    pub fn effective_native_css(&self) -> bool {
        self.native_css.unwrap_or(
            !self.shim_css_properties && (self.native_shadow || self.supports_custom_properties),
        )
    }

    /// Non-empty global css-build marker.
    #[inline]
    pub fn css_build(&self) -> Option<&str> {
        self.css_build.as_deref().filter(|build| !build.is_empty())
    }

    /// # Errors
    /// Returns an error when `text` is not a valid settings object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing shim settings")
    }

    /// # Errors
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading shim settings from {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }
}
