//! Run the apply shim over stylesheet files.
//!
//! Every file is loaded into the same in-memory document, so mixins defined by
//! an earlier file are visible to later ones.

use anyhow::{Context as _, Result, bail};
use css_orchestrator::{ApplyShim, InMemoryDocument, ShimSettings, StyleHost as _};
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

pub const USAGE: &str =
    "usage: apply_shim [--settings=<json>] [--scope=<name>] [--custom-style] [--strip] <file>...";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub settings: Option<PathBuf>,
    pub scope: Option<String>,
    /// Treat every file as a document-level custom style.
    pub custom_style: bool,
    /// Drop custom properties and `@apply` from the output.
    pub strip: bool,
    pub files: Vec<PathBuf>,
}

/// Parse arguments that follow the program name.
///
/// # Errors
/// Returns an error for unknown flags, a flag missing its value, or when no
/// file is given.
pub fn parse_args<I>(args: I) -> Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut pending: Option<String> = None;
    for arg in args {
        if let Some(flag) = pending.take() {
            match flag.as_str() {
                "--settings" => options.settings = Some(PathBuf::from(arg)),
                _ => options.scope = Some(arg),
            }
            continue;
        }
        if let Some(rest) = arg.strip_prefix("--settings=") {
            options.settings = Some(PathBuf::from(rest));
        } else if let Some(rest) = arg.strip_prefix("--scope=") {
            options.scope = Some(rest.to_owned());
        } else if arg == "--settings" || arg == "--scope" {
            pending = Some(arg);
        } else if arg == "--custom-style" {
            options.custom_style = true;
        } else if arg == "--strip" {
            options.strip = true;
        } else if arg.starts_with("--") {
            bail!("unknown option `{arg}`\n{USAGE}");
        } else {
            options.files.push(PathBuf::from(arg));
        }
    }
    if let Some(flag) = pending {
        bail!("`{flag}` needs a value\n{USAGE}");
    }
    if options.files.is_empty() {
        bail!("no stylesheet given\n{USAGE}");
    }
    Ok(options)
}

/// Settings from `--settings`, or defaults, with `--strip` applied.
///
/// # Errors
/// Returns an error if the settings file cannot be read or parsed.
pub fn load_settings(options: &CliOptions) -> Result<ShimSettings> {
    let mut settings = match &options.settings {
        Some(path) => ShimSettings::from_path(path)?,
        None => ShimSettings::default(),
    };
    if options.strip {
        settings.native_css = Some(false);
    }
    Ok(settings)
}

/// Transform every file and write the results to `out`. Returns the number of
/// stylesheets written.
///
/// # Errors
/// Returns an error if a file cannot be read, the document rejects a style, or
/// writing fails.
pub fn run<W: Write>(options: &CliOptions, out: &mut W) -> Result<usize> {
    let settings = load_settings(options)?;
    let document = InMemoryDocument::new(settings.viewport.clone());
    let mut shim = ApplyShim::new(document, settings);
    let head = shim.host().head();
    let with_headers = options.files.len() > 1;

    for path in &options.files {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading stylesheet {}", path.display()))?;
        let style = shim.host_mut().append_style(head, &text)?;
        if options.custom_style {
            shim.add_custom_style(style);
            shim.flush_custom_styles();
        } else if shim.transform_style(style, options.scope.as_deref()).is_none() {
            debug!("{} has no rules", path.display());
        }
        let output = shim.host().text_content(style).unwrap_or_default();
        if with_headers {
            writeln!(out, "/* {} */", path.display())?;
        }
        write!(out, "{output}")?;
    }
    out.flush().context("flushing output")?;
    info!("transformed {} stylesheets", options.files.len());
    Ok(options.files.len())
}
