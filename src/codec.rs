//! Placeholder codec for templating fragments
//!
//! HTML and CSS tooling does not understand Nunjucks syntax: a `{{ var }}`
//! inside a `<table>` gets foster-parented, a `{% for %}` between two `<tr>`
//! gets moved around, and quotes inside attribute values get escaped. Before
//! the markup passes run, every fragment is swapped for an inert HTML comment
//! carrying the base64 of the original text:
//!
//! ```text
//! {{ user.name }}   ->  <!--VAR:e3sgdXNlci5uYW1lIH19-->
//! {% if x %}        ->  <!--FLOW:eyUgaWYgeCAlfQ==-->
//! ```
//!
//! `block`, `endblock` and `extends` tags are left alone so the inheritance
//! scans in [`crate::template`] see the same text before and after protection.
//!
//! # Example
//!
//! ```rust
//! use template_mailer::codec::{protect, restore};
//!
//! let text = "<td>Hi {{ user.name }}</td>";
//! let protected = protect(text);
//! assert!(!protected.contains("{{"));
//! assert_eq!(restore(&protected), text);
//! ```

use std::fmt;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::{Captures, Regex};
use thiserror::Error;

/// Variable expressions or flow tags, whichever starts first.
static FRAGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").unwrap());

/// Protected tokens, including the entity-escaped form serializers emit for
/// tokens that ended up inside attribute values.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:<!--|&lt;!--)(VAR|FLOW):(.*?)(?:-->|--&gt;)").unwrap()
});

/// Flow tags that drive inheritance and must stay visible.
const STRUCTURAL_KEYWORDS: &[&str] = &["block", "endblock", "extends"];

/// The kind of fragment a placeholder stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// `{{ expression }}`
    Var,
    /// `{% tag %}`
    Flow,
}

impl PlaceholderKind {
    /// Tag written into the comment token
    pub fn tag(self) -> &'static str {
        match self {
            PlaceholderKind::Var => "VAR",
            PlaceholderKind::Flow => "FLOW",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "VAR" => Some(PlaceholderKind::Var),
            "FLOW" => Some(PlaceholderKind::Flow),
            _ => None,
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Why a placeholder payload could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptReason {
    #[error("payload is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("decoded payload is not valid UTF-8")]
    InvalidUtf8,
}

/// A placeholder token whose payload could not be decoded.
///
/// The token is left verbatim in the restored text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("corrupt {kind} placeholder at byte {offset}: {reason}")]
pub struct CorruptPlaceholder {
    pub kind: PlaceholderKind,
    /// The raw payload as found between `KIND:` and `-->`
    pub payload: String,
    /// Byte offset of the token in the text passed to restore
    pub offset: usize,
    pub reason: CorruptReason,
}

/// Result of [`restore_checked`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub text: String,
    pub corrupt: Vec<CorruptPlaceholder>,
}

/// Replace every templating fragment with an opaque comment token.
pub fn protect(text: &str) -> String {
    FRAGMENT_RE
        .replace_all(text, |caps: &Captures| {
            let fragment = &caps[0];
            if fragment.starts_with("{{") {
                encode(PlaceholderKind::Var, fragment)
            } else if is_structural_tag(fragment) {
                fragment.to_string()
            } else {
                encode(PlaceholderKind::Flow, fragment)
            }
        })
        .into_owned()
}

/// Replace every placeholder token with the fragment it encodes.
///
/// Corrupt tokens are left in place; use [`restore_checked`] to find out
/// which ones.
pub fn restore(text: &str) -> String {
    restore_checked(text).text
}

/// Like [`restore`], also reporting tokens that failed to decode.
pub fn restore_checked(text: &str) -> Restored {
    let mut corrupt = Vec::new();
    let restored = TOKEN_RE
        .replace_all(text, |caps: &Captures| {
            let token = &caps[0];
            let Some(kind) = PlaceholderKind::from_tag(&caps[1]) else {
                return token.to_string();
            };
            match decode(&caps[2]) {
                Ok(fragment) => fragment,
                Err(reason) => {
                    corrupt.push(CorruptPlaceholder {
                        kind,
                        payload: caps[2].to_string(),
                        offset: caps.get(0).map_or(0, |m| m.start()),
                        reason,
                    });
                    token.to_string()
                }
            }
        })
        .into_owned();

    Restored {
        text: restored,
        corrupt,
    }
}

/// Build the comment token for one fragment
pub fn encode(kind: PlaceholderKind, fragment: &str) -> String {
    format!("<!--{}:{}-->", kind.tag(), STANDARD.encode(fragment))
}

fn decode(payload: &str) -> Result<String, CorruptReason> {
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| CorruptReason::InvalidBase64(e.to_string()))?;
    String::from_utf8(bytes).map_err(|_| CorruptReason::InvalidUtf8)
}

/// `{% block %}`, `{% endblock %}` and `{% extends %}`, matched on the first
/// keyword after an optional `-` whitespace-control marker
fn is_structural_tag(tag: &str) -> bool {
    let inner = tag
        .strip_prefix("{%")
        .unwrap_or(tag)
        .trim_start_matches('-')
        .trim_start();
    let keyword = inner
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .next()
        .unwrap_or("");
    STRUCTURAL_KEYWORDS.contains(&keyword)
}
