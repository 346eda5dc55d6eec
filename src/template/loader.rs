//! Template source loading

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::trace;

/// File extension of template sources, without the dot
pub const DEFAULT_EXTENSION: &str = "njk";

/// Errors that can occur while loading a template source
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No source exists under this name
    #[error("template not found: {name}")]
    NotFound { name: String },

    /// The source exists but could not be read
    #[error("error reading template file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The raw text of one template and its logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    /// Path relative to the source root, extension stripped
    pub name: String,
    pub raw_text: String,
}

impl TemplateSource {
    pub fn new(name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// Loads template sources by name.
///
/// Names may be given with or without the template extension
/// (`"emails/welcome"` and `"emails/welcome.njk"` are the same template).
pub trait TemplateLoader {
    /// Load the raw text of a template
    fn load_source(&self, name: &str) -> Result<TemplateSource, LoaderError>;

    /// Check whether a template exists
    fn exists(&self, name: &str) -> bool;
}

/// Strip the template extension from a name, if present
pub fn logical_name<'a>(name: &'a str, extension: &str) -> &'a str {
    name.strip_suffix(extension)
        .and_then(|stem| stem.strip_suffix('.'))
        .unwrap_or(name)
}

/// Loader reading `<root>/<name>.<extension>` from disk.
///
/// Each file is read at most once; later lookups are served from memory.
#[derive(Debug)]
pub struct FileSystemLoader {
    root: PathBuf,
    extension: String,
    cache: Mutex<HashMap<String, String>>,
}

impl FileSystemLoader {
    /// Create a loader rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different template extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// The source root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing a template name
    pub fn path_for(&self, name: &str) -> PathBuf {
        let logical = logical_name(name, &self.extension);
        self.root.join(format!("{}.{}", logical, self.extension))
    }
}

impl TemplateLoader for FileSystemLoader {
    fn load_source(&self, name: &str) -> Result<TemplateSource, LoaderError> {
        let logical = logical_name(name, &self.extension).to_string();

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(text) = cache.get(&logical) {
            trace!(template = %logical, "template source cache hit");
            return Ok(TemplateSource::new(logical, text.clone()));
        }

        let path = self.path_for(&logical);
        let text = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LoaderError::NotFound {
                    name: logical.clone(),
                }
            } else {
                LoaderError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        trace!(template = %logical, path = %path.display(), "loaded template source");
        cache.insert(logical.clone(), text.clone());
        Ok(TemplateSource::new(logical, text))
    }

    fn exists(&self, name: &str) -> bool {
        let logical = logical_name(name, &self.extension);
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(logical);
        cached || self.path_for(logical).is_file()
    }
}

/// Loader serving templates from an in-memory map
#[derive(Debug, Clone)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
    extension: String,
}

impl Default for MemoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Add a template, builder style
    pub fn with_template(mut self, name: &str, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    /// Add or replace a template
    pub fn insert(&mut self, name: &str, text: impl Into<String>) {
        let logical = logical_name(name, &self.extension).to_string();
        self.templates.insert(logical, text.into());
    }

    /// Get all template names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(|s| s.as_str())
    }
}

impl TemplateLoader for MemoryLoader {
    fn load_source(&self, name: &str) -> Result<TemplateSource, LoaderError> {
        let logical = logical_name(name, &self.extension);
        self.templates
            .get(logical)
            .map(|text| TemplateSource::new(logical, text.clone()))
            .ok_or_else(|| LoaderError::NotFound {
                name: logical.to_string(),
            })
    }

    fn exists(&self, name: &str) -> bool {
        self.templates
            .contains_key(logical_name(name, &self.extension))
    }
}
