//! Email layout markup
//!
//! This module turns the semantic layout tags used in templates into the
//! table-based HTML email clients understand. It runs on protected text (see
//! [`crate::codec`]), so templating fragments only ever appear as comments.

mod error;
mod transform;

pub use error::TransformError;
pub use transform::{LayoutTagTransformer, MarkupTransform, DEFAULT_BUTTON_STYLE};
