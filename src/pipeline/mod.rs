//! Template compile pipeline
//!
//! Each template goes through the same sequence of stages:
//!
//! ```text
//! Resolving -> Protecting -> Transforming -> Inlining -> Restoring -> Writing -> Done
//! ```
//!
//! Resolving and Writing failures stop the template (it ends up in
//! [`BatchReport::failures`]). Transforming and Inlining failures degrade:
//! the stage's input is passed through unchanged and the problem is recorded
//! in [`CompiledTemplate::degradations`]. A batch run never stops early.

pub mod config;
pub mod discovery;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::codec::{self, CorruptPlaceholder};
use crate::error::ResolveError;
use crate::inliner::{CssInliner, InlineError, StyleInliner};
use crate::markup::{LayoutTagTransformer, MarkupTransform, TransformError};
use crate::stylesheet::{Stylesheet, StylesheetError};
use crate::template::{self, FileSystemLoader, TemplateLoader};

pub use config::{CompileConfig, ConfigError};
pub use discovery::find_templates;

/// Errors that stop a whole run before any template is processed
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stylesheet(#[from] StylesheetError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Processing stage of a single template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Protecting,
    Transforming,
    Inlining,
    Restoring,
    Writing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolving => "resolving",
            Stage::Protecting => "protecting",
            Stage::Transforming => "transforming",
            Stage::Inlining => "inlining",
            Stage::Restoring => "restoring",
            Stage::Writing => "writing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem; the template was still written
#[derive(Debug, Error)]
pub enum Degradation {
    /// Layout tags were not rewritten
    #[error("markup left untransformed: {0}")]
    MarkupParseFailure(TransformError),

    /// Styles were not inlined
    #[error("styles left uninlined: {0}")]
    InlineFailure(InlineError),

    /// A placeholder could not be restored
    #[error("unresolved placeholder: {0}")]
    CorruptPlaceholder(CorruptPlaceholder),
}

/// Why a template failed
#[derive(Debug, Error)]
pub enum FailureKind {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A template that ended in the failed state
#[derive(Debug, Error)]
#[error("failed to process {name} while {stage}: {kind}")]
pub struct TemplateFailure {
    pub name: String,
    /// Stage the failure happened in
    pub stage: Stage,
    #[source]
    pub kind: FailureKind,
}

/// Output of the in-memory stages for one template
#[derive(Debug)]
pub struct Processed {
    pub name: String,
    pub html: String,
    pub degradations: Vec<Degradation>,
}

/// A template that was compiled and written
#[derive(Debug)]
pub struct CompiledTemplate {
    pub name: String,
    pub output_path: PathBuf,
    pub html: String,
    pub degradations: Vec<Degradation>,
}

/// Outcome of a run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub compiled: Vec<CompiledTemplate>,
    pub failures: Vec<TemplateFailure>,
}

impl BatchReport {
    /// True when no template failed (degradations do not count)
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of degradations across compiled templates
    pub fn degradation_count(&self) -> usize {
        self.compiled.iter().map(|c| c.degradations.len()).sum()
    }
}

/// Compiles templates according to a [`CompileConfig`]
pub struct Pipeline {
    config: CompileConfig,
    loader: Box<dyn TemplateLoader>,
    transformer: Box<dyn MarkupTransform>,
    inliner: Box<dyn StyleInliner>,
    stylesheet: Stylesheet,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("stylesheet", &self.stylesheet.path)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Build a pipeline reading templates and the stylesheet from disk
    pub fn new(config: CompileConfig) -> Result<Self, PipelineError> {
        let stylesheet = Stylesheet::from_file(&config.css_path)?;
        debug!(
            path = %config.css_path.display(),
            at_rules = stylesheet.at_rules().len(),
            "loaded stylesheet"
        );
        let loader =
            FileSystemLoader::new(config.src_dir.clone()).with_extension(config.extension.clone());
        Ok(Self::with_parts(config, Box::new(loader), stylesheet))
    }

    /// Build a pipeline around a custom loader and stylesheet
    pub fn with_parts(
        config: CompileConfig,
        loader: Box<dyn TemplateLoader>,
        stylesheet: Stylesheet,
    ) -> Self {
        Self {
            config,
            loader,
            transformer: Box::new(LayoutTagTransformer::new()),
            inliner: Box::new(CssInliner::new()),
            stylesheet,
        }
    }

    /// Replace the markup transform
    pub fn with_transformer(mut self, transformer: Box<dyn MarkupTransform>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Replace the style inliner
    pub fn with_inliner(mut self, inliner: Box<dyn StyleInliner>) -> Self {
        self.inliner = inliner;
        self
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Compile the configured template, or every discovered one
    pub fn run(&self) -> Result<BatchReport, PipelineError> {
        let names = match &self.config.template {
            Some(name) => vec![name.clone()],
            None => {
                std::fs::create_dir_all(&self.config.dist_dir).map_err(|source| {
                    PipelineError::OutputDir {
                        path: self.config.dist_dir.clone(),
                        source,
                    }
                })?;
                let names = find_templates(&self.config);
                info!(
                    count = names.len(),
                    templates = %names.join(", "),
                    "Found templates to process"
                );
                names
            }
        };

        let mut report = BatchReport::default();
        for name in names {
            match self.compile_template(&name) {
                Ok(compiled) => report.compiled.push(compiled),
                Err(failure) => {
                    error!(template = %failure.name, stage = %failure.stage, error = %failure.kind, "template failed");
                    report.failures.push(failure);
                }
            }
        }

        info!(
            compiled = report.compiled.len(),
            failed = report.failures.len(),
            degraded = report.degradation_count(),
            "All templates processed"
        );
        Ok(report)
    }

    /// Run every stage for one template and write the result
    pub fn compile_template(&self, name: &str) -> Result<CompiledTemplate, TemplateFailure> {
        let processed = self.process(name)?;

        let _span = info_span!("template", name = %name).entered();
        debug!(stage = %Stage::Writing, "entering stage");
        let output_path = self.config.output_path(&processed.name);
        write_output(&output_path, &processed.html).map_err(|source| TemplateFailure {
            name: processed.name.clone(),
            stage: Stage::Writing,
            kind: FailureKind::Write {
                path: output_path.clone(),
                source,
            },
        })?;

        debug!(stage = %Stage::Done, "entering stage");
        info!(path = %output_path.display(), "Created template");

        Ok(CompiledTemplate {
            name: processed.name,
            output_path,
            html: processed.html,
            degradations: processed.degradations,
        })
    }

    /// Run the in-memory stages for one template without writing anything
    pub fn process(&self, name: &str) -> Result<Processed, TemplateFailure> {
        let name = template::logical_name(name, &self.config.extension);
        process_with(
            self.loader.as_ref(),
            self.transformer.as_ref(),
            self.inliner.as_ref(),
            &self.stylesheet,
            name,
        )
    }
}

/// Resolve, protect, transform, inline and restore one template
pub fn process_with(
    loader: &dyn TemplateLoader,
    transformer: &dyn MarkupTransform,
    inliner: &dyn StyleInliner,
    stylesheet: &Stylesheet,
    name: &str,
) -> Result<Processed, TemplateFailure> {
    let _span = info_span!("template", name = %name).entered();
    info!("Processing template");

    let mut degradations = Vec::new();

    debug!(stage = %Stage::Resolving, "entering stage");
    let merged = template::resolve(loader, name).map_err(|err| TemplateFailure {
        name: name.to_string(),
        stage: Stage::Resolving,
        kind: FailureKind::Resolve(err),
    })?;

    debug!(stage = %Stage::Protecting, "entering stage");
    let protected = codec::protect(&merged);

    debug!(stage = %Stage::Transforming, "entering stage");
    let transformed = match transformer.transform(&protected) {
        Ok(html) => html,
        Err(err) => {
            warn!(error = %err, "markup transform failed; passing html through untransformed");
            degradations.push(Degradation::MarkupParseFailure(err));
            protected
        }
    };

    debug!(stage = %Stage::Inlining, "entering stage");
    let inlined = match inliner.inline(&transformed, stylesheet.css()) {
        Ok(html) => html,
        Err(err) => {
            warn!(error = %err, "CSS inlining failed; passing html through uninlined");
            degradations.push(Degradation::InlineFailure(err));
            transformed
        }
    };

    debug!(stage = %Stage::Restoring, "entering stage");
    let restored = codec::restore_checked(&inlined);
    for corrupt in restored.corrupt {
        warn!(error = %corrupt, "placeholder left unresolved in output");
        degradations.push(Degradation::CorruptPlaceholder(corrupt));
    }

    Ok(Processed {
        name: name.to_string(),
        html: restored.text,
        degradations,
    })
}

fn write_output(path: &std::path::Path, html: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
}
