//! Inheritance resolution - flattens `extends`/`block` chains into one template
//!
//! This is a lexical pass, not a template parse: `{% extends %}` and
//! `{% block %}` tags are located with regular expressions and every other
//! templating fragment is carried through as text so it can be rendered
//! later with real data.
//!
//! Block substitution happens once per level. When a layout extends a further
//! ancestor, the child's content is written back into the layout wrapped in
//! its block markers, and the result is resolved as if it were the layout's
//! own source. The deepest child therefore wins over every ancestor.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Reference, ResolveError};

use super::loader::{LoaderError, TemplateLoader, TemplateSource};

static EXTENDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*extends\s+['"]([^'"]+)['"]\s*-?%\}"#).unwrap()
});

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\{%-?\s*block\s+([a-zA-Z0-9_]+)\s*-?%\}(.*?)\{%-?\s*endblock(?:\s+[a-zA-Z0-9_]+)?\s*-?%\}",
    )
    .unwrap()
});

static BLOCK_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%-?\s*block\s+([a-zA-Z0-9_]+)\s*-?%\}").unwrap());

static BLOCK_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%-?\s*endblock(?:\s+[a-zA-Z0-9_]+)?\s*-?%\}").unwrap()
});

static EMPTY_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{%-?\s*block\s+[a-zA-Z0-9_]+\s*-?%\}\s*\{%-?\s*endblock(?:\s+[a-zA-Z0-9_]+)?\s*-?%\}",
    )
    .unwrap()
});

/// An `{% extends "..." %}` declaration found in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendsDeclaration {
    /// Referenced layout, as written
    pub layout_name: String,
    /// Byte range of the whole declaration
    pub span: Range<usize>,
}

/// Content a child template supplies for a named block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOverride {
    pub name: String,
    /// Block body, trimmed
    pub content: String,
}

/// Chain of templates currently being resolved (for cycle detection)
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    resolving: Vec<String>,
}

impl ResolutionContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a template is currently being resolved
    pub fn is_resolving(&self, name: &str) -> bool {
        self.resolving.iter().any(|n| n == name)
    }

    /// Mark a template as being resolved
    pub fn start_resolving(&mut self, name: &str) {
        self.resolving.push(name.to_string());
    }

    /// The chain so far, extended with `next`
    fn chain_to(&self, next: &str) -> Vec<String> {
        let mut chain = self.resolving.clone();
        chain.push(next.to_string());
        chain
    }
}

/// Find the first extends declaration in a template
pub fn find_extends(text: &str) -> Option<ExtendsDeclaration> {
    EXTENDS_RE.captures(text).map(|caps| ExtendsDeclaration {
        layout_name: caps[1].to_string(),
        span: caps.get(0).map_or(0..0, |m| m.range()),
    })
}

/// Collect the block overrides of a child template.
///
/// When a block name appears more than once the last occurrence wins.
pub fn collect_overrides(text: &str) -> Vec<BlockOverride> {
    let mut overrides: Vec<BlockOverride> = Vec::new();

    for caps in BLOCK_RE.captures_iter(text) {
        let name = &caps[1];
        let content = caps[2].trim().to_string();

        match overrides.iter_mut().find(|o| o.name == name) {
            Some(existing) => {
                warn!(block = name, "block defined more than once; last definition wins");
                existing.content = content;
            }
            None => overrides.push(BlockOverride {
                name: name.to_string(),
                content,
            }),
        }
    }

    overrides
}

/// Byte range of the first `{% block name %}...{% endblock %}` region
fn find_block_region(text: &str, name: &str) -> Option<Range<usize>> {
    let open = BLOCK_OPEN_RE
        .captures_iter(text)
        .find(|caps| &caps[1] == name)?
        .get(0)?;
    let close = BLOCK_CLOSE_RE.find_at(text, open.end())?;
    Some(open.start()..close.end())
}

/// Substitute overrides into the first matching block region of a layout.
///
/// With `keep_markers`, substituted content stays wrapped in its block tags so
/// the layout can hand it on to its own ancestor.
pub fn apply_overrides(layout: &str, overrides: &[BlockOverride], keep_markers: bool) -> String {
    let mut merged = layout.to_string();

    for block in overrides {
        let Some(region) = find_block_region(&merged, &block.name) else {
            debug!(block = %block.name, "layout has no such block; override dropped");
            continue;
        };

        let replacement = if keep_markers {
            format!(
                "{{% block {} %}}{}{{% endblock %}}",
                block.name, block.content
            )
        } else {
            block.content.clone()
        };
        merged.replace_range(region, &replacement);
    }

    merged
}

/// Remove what is left of the inheritance markup once no ancestor remains:
/// extends declarations and empty blocks are deleted, blocks that still hold
/// layout defaults are unwrapped to that content.
pub fn flatten(text: &str) -> String {
    let mut out = EXTENDS_RE.replace_all(text, "").into_owned();

    loop {
        let pruned = EMPTY_BLOCK_RE.replace_all(&out, "");
        let next = BLOCK_RE.replace_all(&pruned, "${2}").into_owned();
        if next == out {
            return out;
        }
        out = next;
    }
}

/// Resolve a template's inheritance chain into a single template body.
///
/// A template without an extends declaration is returned unchanged.
///
/// # Example
///
/// ```rust
/// use template_mailer::template::{resolve, MemoryLoader};
///
/// let loader = MemoryLoader::new()
///     .with_template("layout", "<main>{% block body %}{% endblock %}</main>")
///     .with_template(
///         "welcome",
///         r#"{% extends "layout.njk" %}{% block body %}Hi {{ name }}{% endblock %}"#,
///     );
///
/// assert_eq!(resolve(&loader, "welcome").unwrap(), "<main>Hi {{ name }}</main>");
/// ```
pub fn resolve(loader: &dyn TemplateLoader, name: &str) -> Result<String, ResolveError> {
    let source = loader.load_source(name).map_err(|e| missing(e, None))?;

    if find_extends(&source.raw_text).is_none() {
        return Ok(source.raw_text);
    }

    let mut ctx = ResolutionContext::new();
    resolve_source(loader, source, &mut ctx)
}

fn resolve_source(
    loader: &dyn TemplateLoader,
    child: TemplateSource,
    ctx: &mut ResolutionContext,
) -> Result<String, ResolveError> {
    let Some(extends) = find_extends(&child.raw_text) else {
        return Ok(flatten(&child.raw_text));
    };

    ctx.start_resolving(&child.name);

    let reference = Reference {
        template: child.name.clone(),
        source: child.raw_text.clone(),
        span: extends.span.clone(),
    };
    let layout = loader
        .load_source(&extends.layout_name)
        .map_err(|e| missing(e, Some(reference)))?;

    if ctx.is_resolving(&layout.name) {
        return Err(ResolveError::CyclicInheritance {
            chain: ctx.chain_to(&layout.name),
        });
    }

    debug!(template = %child.name, layout = %layout.name, "merging blocks into layout");

    let overrides = collect_overrides(&child.raw_text);
    let keep_markers = find_extends(&layout.raw_text).is_some();
    let merged = apply_overrides(&layout.raw_text, &overrides, keep_markers);

    resolve_source(
        loader,
        TemplateSource {
            name: layout.name,
            raw_text: merged,
        },
        ctx,
    )
}

fn missing(err: LoaderError, referenced_from: Option<Reference>) -> ResolveError {
    match err {
        LoaderError::NotFound { name } => ResolveError::SourceNotFound {
            name,
            referenced_from,
        },
        other => ResolveError::Loader(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::MemoryLoader;
    use pretty_assertions::assert_eq;

    const LAYOUT: &str =
        "<container><row><columns>{% block body %}{% endblock %}</columns></row></container>";

    #[test]
    fn test_find_extends() {
        let text = r#"<p>{% extends 'base.njk' %}</p>"#;
        let decl = find_extends(text).expect("Should find extends");
        assert_eq!(decl.layout_name, "base.njk");
        assert_eq!(&text[decl.span.clone()], "{% extends 'base.njk' %}");
        assert!(find_extends("{% block body %}{% endblock %}").is_none());
    }

    #[test]
    fn test_whitespace_control_markers() {
        let decl = find_extends("{%- extends 'a.njk' -%}").expect("Should find extends");
        assert_eq!(decl.layout_name, "a.njk");

        let loader = MemoryLoader::new()
            .with_template("a", "<p>{%- block body -%}{%- endblock -%}</p>")
            .with_template(
                "leaf",
                "{%- extends 'a.njk' %}\n{%- block body -%} Hi {{ name }} {%- endblock body -%}",
            );
        assert_eq!(resolve(&loader, "leaf").unwrap(), "<p>Hi {{ name }}</p>");
    }

    #[test]
    fn test_collect_overrides_trims_content() {
        let overrides = collect_overrides(
            "{% block title %}\n  Hello\n{% endblock %}{% block body %}{{ a }}{% endblock body %}",
        );
        assert_eq!(
            overrides,
            vec![
                BlockOverride {
                    name: "title".to_string(),
                    content: "Hello".to_string()
                },
                BlockOverride {
                    name: "body".to_string(),
                    content: "{{ a }}".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_block_last_wins() {
        let overrides =
            collect_overrides("{% block body %}first{% endblock %}{% block body %}second{% endblock %}");
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].content, "second");
    }

    #[test]
    fn test_apply_overrides_first_occurrence_only() {
        let layout = "{% block a %}1{% endblock %}|{% block a %}2{% endblock %}";
        let merged = apply_overrides(
            layout,
            &[BlockOverride {
                name: "a".to_string(),
                content: "X".to_string(),
            }],
            false,
        );
        assert_eq!(merged, "X|{% block a %}2{% endblock %}");
    }

    #[test]
    fn test_apply_overrides_keeps_dollar_signs_literal() {
        let merged = apply_overrides(
            "{% block price %}{% endblock %}",
            &[BlockOverride {
                name: "price".to_string(),
                content: "$1.00 and ${2}".to_string(),
            }],
            false,
        );
        assert_eq!(merged, "$1.00 and ${2}");
    }

    #[test]
    fn test_flatten_removes_empty_and_unwraps_defaults() {
        let text = "{% block head %}  \n {% endblock %}<p>{% block footer %}(c){% endblock %}</p>";
        assert_eq!(flatten(text), "<p>(c)</p>");
    }

    #[test]
    fn test_no_extends_returns_raw_text() {
        let raw = "<p>{% block body %}{% endblock %} {{ a }}</p>";
        let loader = MemoryLoader::new().with_template("plain", raw);
        assert_eq!(resolve(&loader, "plain").unwrap(), raw);
    }

    #[test]
    fn test_single_level_scenario() {
        let loader = MemoryLoader::new().with_template("layout", LAYOUT).with_template(
            "welcome",
            r#"{% extends "layout.njk" %}{% block body %}Hi {{ user.name }}{% endblock %}"#,
        );
        assert_eq!(
            resolve(&loader, "welcome").unwrap(),
            "<container><row><columns>Hi {{ user.name }}</columns></row></container>"
        );
    }

    #[test]
    fn test_child_wins_over_all_ancestors() {
        let loader = MemoryLoader::new()
            .with_template(
                "base",
                "<html>{% block title %}Base{% endblock %}|{% block body %}N{% endblock %}</html>",
            )
            .with_template(
                "layout",
                r#"{% extends "base.njk" %}{% block body %}M{% endblock %}"#,
            )
            .with_template(
                "leaf",
                r#"{% extends "layout.njk" %}{% block body %}L{% endblock %}"#,
            );
        assert_eq!(resolve(&loader, "leaf").unwrap(), "<html>Base|L</html>");
    }

    #[test]
    fn test_middle_layout_overrides_reach_base() {
        let loader = MemoryLoader::new()
            .with_template(
                "base",
                "{% block title %}Base{% endblock %}|{% block body %}{% endblock %}",
            )
            .with_template(
                "layout",
                r#"{% extends "base.njk" %}{% block title %}Layout{% endblock %}{% block body %}M{% endblock %}"#,
            )
            .with_template(
                "leaf",
                r#"{% extends "layout.njk" %}{% block body %}L{% endblock %}"#,
            );
        assert_eq!(resolve(&loader, "leaf").unwrap(), "Layout|L");
    }

    #[test]
    fn test_missing_block_is_noop() {
        let with_extra = MemoryLoader::new().with_template("layout", LAYOUT).with_template(
            "leaf",
            r#"{% extends "layout.njk" %}{% block body %}B{% endblock %}{% block sidebar %}S{% endblock %}"#,
        );
        let without_extra = MemoryLoader::new().with_template("layout", LAYOUT).with_template(
            "leaf",
            r#"{% extends "layout.njk" %}{% block body %}B{% endblock %}"#,
        );
        assert_eq!(
            resolve(&with_extra, "leaf").unwrap(),
            resolve(&without_extra, "leaf").unwrap()
        );
    }

    #[test]
    fn test_missing_layout_reports_reference() {
        let child = r#"<p>{% extends "nowhere.njk" %}</p>"#;
        let loader = MemoryLoader::new().with_template("leaf", child);
        match resolve(&loader, "leaf") {
            Err(ResolveError::SourceNotFound {
                name,
                referenced_from: Some(reference),
            }) => {
                assert_eq!(name, "nowhere");
                assert_eq!(reference.template, "leaf");
                assert_eq!(&child[reference.span], r#"{% extends "nowhere.njk" %}"#);
            }
            other => panic!("expected SourceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_template_itself() {
        let loader = MemoryLoader::new();
        assert!(matches!(
            resolve(&loader, "ghost"),
            Err(ResolveError::SourceNotFound {
                referenced_from: None,
                ..
            })
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let loader = MemoryLoader::new()
            .with_template("a", r#"{% extends "b.njk" %}{% block x %}A{% endblock %}"#)
            .with_template("b", r#"{% extends "a.njk" %}{% block x %}B{% endblock %}"#);
        match resolve(&loader, "a") {
            Err(ResolveError::CyclicInheritance { chain }) => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("expected CyclicInheritance, got {other:?}"),
        }
    }

    #[test]
    fn test_self_extension_detected() {
        let loader = MemoryLoader::new().with_template("me", r#"{% extends "me.njk" %}"#);
        let err = resolve(&loader, "me").unwrap_err();
        assert_eq!(err.to_string(), "cyclic template inheritance: me -> me");
    }
}
