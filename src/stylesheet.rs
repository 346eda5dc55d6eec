//! Stylesheet loading
//!
//! The stylesheet (usually Foundation for Emails' CSS) is read once per run
//! and handed to the inliner as extra CSS for every template.
//!
//! At-rules cannot be inlined into `style` attributes. [`preserved_at_rules`]
//! picks out the `@media` and `@font-face` blocks so the inliner can carry
//! them into the document's `<head>` instead.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur when loading a stylesheet
#[derive(Error, Debug)]
pub enum StylesheetError {
    #[error("Failed to read stylesheet file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// CSS merged into element styles during inlining
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    /// File the CSS was read from, if any
    pub path: Option<PathBuf>,
    /// Raw CSS text
    pub css: String,
}

impl Stylesheet {
    /// Load stylesheet from a CSS file
    pub fn from_file(path: &Path) -> Result<Self, StylesheetError> {
        let css = std::fs::read_to_string(path).map_err(|source| StylesheetError::IoError {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Stylesheet {
            path: Some(path.to_path_buf()),
            css,
        })
    }

    /// Use CSS text directly
    pub fn from_css(css: impl Into<String>) -> Self {
        Stylesheet {
            path: None,
            css: css.into(),
        }
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn is_empty(&self) -> bool {
        self.css.trim().is_empty()
    }

    /// Top-level at-rules (`@media`, `@font-face`, `@import`, ...)
    pub fn at_rules(&self) -> Vec<AtRule<'_>> {
        top_level_at_rules(&self.css)
    }
}

/// At-rules copied into the document rather than inlined
const PRESERVED_AT_RULES: &[&str] = &["media", "font-face"];

/// A top-level at-rule in a stylesheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtRule<'a> {
    /// Name without the `@`, e.g. `media`
    pub name: &'a str,
    /// Full rule text, from `@` to the closing `}` or `;`
    pub text: &'a str,
}

/// Find the at-rules at nesting depth 0.
///
/// Comments and quoted strings are skipped, so an `@` inside `url("x@2x.png")`
/// or `/* @media */` is not an at-rule. A rule left unterminated at the end of
/// the input is ignored.
pub fn top_level_at_rules(css: &str) -> Vec<AtRule<'_>> {
    let bytes = css.as_bytes();
    let mut rules = Vec::new();
    let mut depth = 0usize;
    let mut current: Option<usize> = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |end| i + 2 + end + 2);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'@' if depth == 0 && current.is_none() => current = Some(i),
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(start) = current.take() {
                        rules.push(at_rule(css, start, i + 1));
                    }
                }
            }
            b';' if depth == 0 => {
                if let Some(start) = current.take() {
                    rules.push(at_rule(css, start, i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }

    rules
}

/// The `@media` and `@font-face` rules of a stylesheet, in source order
pub fn preserved_at_rules(css: &str) -> Vec<&str> {
    top_level_at_rules(css)
        .into_iter()
        .filter(|rule| {
            PRESERVED_AT_RULES
                .iter()
                .any(|name| rule.name.eq_ignore_ascii_case(name))
        })
        .map(|rule| rule.text)
        .collect()
}

fn at_rule(css: &str, start: usize, end: usize) -> AtRule<'_> {
    let text = &css[start..end];
    let name = text[1..]
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .next()
        .unwrap_or("");
    AtRule { name, text }
}
