//! Error types for inheritance resolution

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::template::LoaderError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Where a missing template was referenced from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Logical name of the referencing template
    pub template: String,
    /// Its source text, as it was when the reference was followed
    pub source: String,
    /// The `{% extends %}` declaration
    pub span: Span,
}

/// Errors that can occur while resolving template inheritance
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A template or one of its layouts does not exist
    #[error("template not found: {name}")]
    SourceNotFound {
        name: String,
        referenced_from: Option<Reference>,
    },

    /// The extends chain loops back on itself
    #[error("cyclic template inheritance: {}", chain.join(" -> "))]
    CyclicInheritance { chain: Vec<String> },

    /// The loader failed for a reason other than a missing template
    #[error(transparent)]
    Loader(LoaderError),
}

impl ResolveError {
    /// Format the error with source context using ariadne.
    ///
    /// Only a missing layout carries a location; other errors format as their
    /// message.
    pub fn format(&self) -> String {
        let ResolveError::SourceNotFound {
            name,
            referenced_from: Some(reference),
        } = self
        else {
            return self.to_string();
        };

        let filename = reference.template.as_str();
        let message = format!("layout '{}' not found", name);
        let span = char_span(&reference.source, &reference.span);
        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(&message)
            .with_label(
                Label::new((filename, span))
                    .with_message(format!("'{}' extends a template that does not exist", filename))
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(reference.source.as_str())), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

/// ariadne positions are character offsets; regex spans are byte offsets
fn char_span(source: &str, span: &Span) -> Span {
    let to_chars = |byte: usize| {
        source
            .get(..byte)
            .map_or_else(|| source.chars().count(), |prefix| prefix.chars().count())
    };
    to_chars(span.start)..to_chars(span.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = ResolveError::CyclicInheritance {
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic template inheritance: a -> b -> a");
    }

    #[test]
    fn test_format_points_at_extends() {
        let source = r#"{% extends "base.njk" %}"#.to_string();
        let err = ResolveError::SourceNotFound {
            name: "base".to_string(),
            referenced_from: Some(Reference {
                template: "welcome".to_string(),
                span: 0..source.len(),
                source,
            }),
        };
        let report = err.format();
        assert!(report.contains("layout 'base' not found"));
        assert!(report.contains("welcome"));
    }

    #[test]
    fn test_char_span_counts_characters() {
        let source = r#"<p>Grüße</p>{% extends "base.njk" %}"#;
        let start = source.find("{%").unwrap();
        let span = char_span(source, &(start..source.len()));
        assert_eq!(span, 12..source.chars().count());
        assert_eq!(char_span("abc", &(0..2)), 0..2);
    }

    #[test]
    fn test_format_without_reference() {
        let err = ResolveError::SourceNotFound {
            name: "ghost".to_string(),
            referenced_from: None,
        };
        assert_eq!(err.format(), "template not found: ghost");
    }
}
