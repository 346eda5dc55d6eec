//! CSS inlining adapter
//!
//! Thin wrapper around [`css_inline`]. Rules from the document's `<style>`
//! tags and from the run's [`Stylesheet`](crate::Stylesheet) are merged into
//! `style` attributes. At-rules are never inlined: the document's own
//! `<style>` tags are kept as they are, and the stylesheet's `@media` and
//! `@font-face` rules are written into a new `<style>` block in `<head>`.

use std::borrow::Cow;

use css_inline::CSSInliner;
use thiserror::Error;

use crate::stylesheet::preserved_at_rules;

/// CSS inlining failed
#[derive(Debug, Error)]
#[error("CSS inlining failed: {message}")]
pub struct InlineError {
    message: String,
}

impl InlineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<css_inline::InlineError> for InlineError {
    fn from(err: css_inline::InlineError) -> Self {
        Self::new(err.to_string())
    }
}

/// Merges stylesheet rules into element `style` attributes
pub trait StyleInliner {
    fn inline(&self, html: &str, extra_css: &str) -> Result<String, InlineError>;
}

/// [`StyleInliner`] backed by `css-inline`
#[derive(Debug, Clone)]
pub struct CssInliner {
    keep_style_tags: bool,
}

impl Default for CssInliner {
    fn default() -> Self {
        Self {
            keep_style_tags: true,
        }
    }
}

impl CssInliner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether `<style>` tags are kept after inlining.
    ///
    /// Dropping them also drops any media queries they contain.
    pub fn with_keep_style_tags(mut self, keep: bool) -> Self {
        self.keep_style_tags = keep;
        self
    }
}

impl StyleInliner for CssInliner {
    fn inline(&self, html: &str, extra_css: &str) -> Result<String, InlineError> {
        let extra = (!extra_css.trim().is_empty()).then_some(Cow::Borrowed(extra_css));
        let inliner = CSSInliner::options()
            .keep_style_tags(self.keep_style_tags)
            .load_remote_stylesheets(false)
            .extra_css(extra)
            .build();
        let inlined = inliner.inline(html)?;

        let at_rules = preserved_at_rules(extra_css);
        if at_rules.is_empty() {
            return Ok(inlined);
        }
        Ok(insert_head_style(&inlined, &at_rules.join("\n")))
    }
}

/// Add a `<style>` block at the end of `<head>`, or at the start when there is none
fn insert_head_style(html: &str, css: &str) -> String {
    let block = format!("<style>{}</style>", css);
    match html.find("</head>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + block.len());
            out.push_str(&html[..pos]);
            out.push_str(&block);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{}{}", block, html),
    }
}
