//! Template loading and layout inheritance
//!
//! Templates are Nunjucks files. A leaf template names its layout with
//! `{% extends %}` and fills the layout's `{% block %}` regions:
//!
//! ```text
//! // layout.njk
//! <container>{% block body %}{% endblock %}</container>
//!
//! // welcome.njk
//! {% extends "layout.njk" %}
//! {% block body %}Hi {{ user.name }}{% endblock %}
//! ```
//!
//! [`resolve`] merges the two into a single template, keeping every other
//! templating fragment intact for rendering later.

mod loader;
mod resolver;

pub use loader::{
    logical_name, FileSystemLoader, LoaderError, MemoryLoader, TemplateLoader, TemplateSource,
    DEFAULT_EXTENSION,
};
pub use resolver::{
    apply_overrides, collect_overrides, find_extends, flatten, resolve, BlockOverride,
    ExtendsDeclaration, ResolutionContext,
};
