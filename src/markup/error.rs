//! Error types for markup rewriting

use thiserror::Error;

/// The markup could not be rewritten
#[derive(Debug, Error)]
#[error("layout tag rewrite failed: {message}")]
pub struct TransformError {
    message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<lol_html::errors::RewritingError> for TransformError {
    fn from(err: lol_html::errors::RewritingError) -> Self {
        Self::new(err.to_string())
    }
}
