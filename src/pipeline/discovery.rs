//! Leaf template discovery
//!
//! Walks the source tree to find the templates worth compiling. Layouts and
//! partials are told apart from leaf templates by naming convention only:
//! a file is compiled when
//!
//! - it has the template extension,
//! - its file name does not start with the private prefix (`_header.njk`),
//! - its file name contains none of the excluded words (`layout`, `part`),
//! - it contains an `{% extends %}` declaration.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::template::find_extends;

use super::config::CompileConfig;

/// Find all leaf templates under `config.src_dir`.
///
/// Returns logical names (relative, `/`-separated, extension stripped),
/// sorted for deterministic ordering.
pub fn find_templates(config: &CompileConfig) -> Vec<String> {
    let mut names = Vec::new();

    for entry in WalkDir::new(&config.src_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry during discovery");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !is_candidate(path, config) {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable template");
                continue;
            }
        };
        if find_extends(&content).is_none() {
            debug!(path = %path.display(), "no extends declaration; not a leaf template");
            continue;
        }

        if let Some(name) = logical_name_for(path, config) {
            debug!(template = %name, "discovered template");
            names.push(name);
        }
    }

    names.sort();
    names
}

/// Name-based part of the leaf check
fn is_candidate(path: &Path, config: &CompileConfig) -> bool {
    if path.extension().map_or(true, |ext| ext != config.extension.as_str()) {
        return false;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    if !config.private_prefix.is_empty() && file_name.starts_with(&config.private_prefix) {
        return false;
    }

    !config
        .excluded_names
        .iter()
        .any(|word| file_name.contains(word.as_str()))
}

fn logical_name_for(path: &Path, config: &CompileConfig) -> Option<String> {
    let relative = path.strip_prefix(&config.src_dir).ok()?.with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_find_templates_applies_filters() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let leaf = r#"{% extends "layout.njk" %}{% block body %}x{% endblock %}"#;

        write(root, "welcome.njk", leaf);
        write(root, "emails/reset.njk", leaf);
        write(root, "layout.njk", "<container>{% block body %}{% endblock %}</container>");
        write(root, "_private.njk", leaf);
        write(root, "email-layout.njk", leaf);
        write(root, "footer-part.njk", leaf);
        write(root, "standalone.njk", "<p>no inheritance</p>");
        write(root, "notes.txt", leaf);

        let config = CompileConfig::new().with_src_dir(root);
        assert_eq!(find_templates(&config), vec!["emails/reset", "welcome"]);
    }

    #[test]
    fn test_find_templates_custom_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a.html", r#"{% extends "base.html" %}"#);
        write(dir.path(), "b.njk", r#"{% extends "base.html" %}"#);

        let config = CompileConfig::new()
            .with_src_dir(dir.path())
            .with_extension("html");
        assert_eq!(find_templates(&config), vec!["a"]);
    }

    #[test]
    fn test_missing_source_dir_finds_nothing() {
        let config = CompileConfig::new().with_src_dir("/definitely/not/a/dir");
        assert!(find_templates(&config).is_empty());
    }
}
