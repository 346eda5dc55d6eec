//! Template Mailer - email template preprocessing
//!
//! This library turns Nunjucks email templates into self-contained,
//! table-based HTML that still carries its templating syntax:
//!
//! 1. layout inheritance is flattened ([`template`]),
//! 2. templating fragments are hidden from HTML/CSS tooling ([`codec`]),
//! 3. email layout tags become tables ([`markup`]),
//! 4. the stylesheet is inlined ([`inliner`]),
//! 5. the fragments are put back and the result is written ([`pipeline`]).
//!
//! # Example
//!
//! ```rust
//! use template_mailer::{preprocess, MemoryLoader, Stylesheet};
//!
//! let loader = MemoryLoader::new()
//!     .with_template(
//!         "layout",
//!         "<container><row><columns>{% block body %}{% endblock %}</columns></row></container>",
//!     )
//!     .with_template(
//!         "welcome",
//!         r#"{% extends "layout.njk" %}{% block body %}Hi {{ name }}{% endblock %}"#,
//!     );
//!
//! let processed = preprocess(&loader, "welcome", &Stylesheet::default()).unwrap();
//! assert!(processed.html.contains("<td"));
//! assert!(processed.html.contains("Hi {{ name }}"));
//! ```

pub mod codec;
pub mod error;
pub mod inliner;
pub mod markup;
pub mod pipeline;
pub mod stylesheet;
pub mod template;

pub use error::ResolveError;
pub use inliner::{CssInliner, InlineError, StyleInliner};
pub use markup::{LayoutTagTransformer, MarkupTransform, TransformError};
pub use pipeline::{
    BatchReport, CompileConfig, CompiledTemplate, Degradation, FailureKind, Pipeline,
    PipelineError, Processed, Stage, TemplateFailure,
};
pub use stylesheet::Stylesheet;
pub use template::{FileSystemLoader, MemoryLoader, TemplateLoader};

/// Compile templates as described by `config`
///
/// This is the main entry point for the library. It loads the stylesheet,
/// then compiles either `config.template` or every leaf template found under
/// `config.src_dir`, writing results under `config.dist_dir`.
pub fn compile(config: CompileConfig) -> Result<BatchReport, PipelineError> {
    Pipeline::new(config)?.run()
}

/// Run every in-memory stage for one template with the default transformer
/// and inliner, without writing anything
pub fn preprocess(
    loader: &dyn TemplateLoader,
    name: &str,
    stylesheet: &Stylesheet,
) -> Result<Processed, TemplateFailure> {
    pipeline::process_with(
        loader,
        &LayoutTagTransformer::new(),
        &CssInliner::new(),
        stylesheet,
        name,
    )
}
