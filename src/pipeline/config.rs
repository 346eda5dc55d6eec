//! Configuration for a compile run

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::template::DEFAULT_EXTENSION;

/// Errors that can occur when loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Configuration options for compiling templates
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// src_dir = "mail/templates"
/// dist_dir = "mail/dist"
/// css_path = "mail/templates/foundation-emails.css"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    /// Root directory of template sources
    pub src_dir: PathBuf,

    /// Root directory compiled templates are written to
    pub dist_dir: PathBuf,

    /// Stylesheet inlined into every template
    pub css_path: PathBuf,

    /// Compile only this template instead of discovering all of them
    pub template: Option<String>,

    /// Template file extension, without the dot
    pub extension: String,

    /// File names starting with this are private and never compiled
    pub private_prefix: String,

    /// File names containing any of these are layouts or partials
    pub excluded_names: Vec<String>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::from("templates"),
            dist_dir: PathBuf::from("templates-dist"),
            css_path: PathBuf::from("templates").join("foundation-emails.css"),
            template: None,
            extension: DEFAULT_EXTENSION.to_string(),
            private_prefix: "_".to_string(),
            excluded_names: vec!["layout".to_string(), "part".to_string()],
        }
    }
}

impl CompileConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Set the source directory
    pub fn with_src_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.src_dir = dir.into();
        self
    }

    /// Set the destination directory
    pub fn with_dist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dist_dir = dir.into();
        self
    }

    /// Set the stylesheet path
    pub fn with_css_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.css_path = path.into();
        self
    }

    /// Compile a single template instead of the whole source tree
    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self
    }

    /// Set the template extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Where the compiled output of a template is written
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.dist_dir.join(format!("{}.{}", name, self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompileConfig::default();
        assert_eq!(config.src_dir, PathBuf::from("templates"));
        assert_eq!(config.dist_dir, PathBuf::from("templates-dist"));
        assert_eq!(config.css_path, PathBuf::from("templates/foundation-emails.css"));
        assert_eq!(config.template, None);
        assert_eq!(config.extension, "njk");
        assert_eq!(config.private_prefix, "_");
        assert_eq!(config.excluded_names, vec!["layout", "part"]);
    }

    #[test]
    fn test_builder_pattern() {
        let config = CompileConfig::new()
            .with_src_dir("in")
            .with_dist_dir("out")
            .with_css_path("style.css")
            .with_template("welcome");

        assert_eq!(config.src_dir, PathBuf::from("in"));
        assert_eq!(config.dist_dir, PathBuf::from("out"));
        assert_eq!(config.css_path, PathBuf::from("style.css"));
        assert_eq!(config.template.as_deref(), Some("welcome"));
    }

    #[test]
    fn test_output_path() {
        let config = CompileConfig::new().with_dist_dir("dist");
        assert_eq!(
            config.output_path("emails/welcome"),
            PathBuf::from("dist/emails/welcome.njk")
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = CompileConfig::from_toml(
            r#"
src_dir = "mail"
excluded_names = ["layout"]
"#,
        )
        .expect("Should parse");
        assert_eq!(config.src_dir, PathBuf::from("mail"));
        assert_eq!(config.dist_dir, PathBuf::from("templates-dist"));
        assert_eq!(config.excluded_names, vec!["layout"]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = CompileConfig::from_toml("srcdir = \"typo\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
