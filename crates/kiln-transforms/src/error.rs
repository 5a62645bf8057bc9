//! Transformation errors.

use std::path::Path;

/// Errors that can occur while transforming assets.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Failed to compile {path}: {message}")]
    Compile { path: String, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid glob pattern: {0}")]
    Glob(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TransformError {
    pub fn compile(path: &Path, message: impl Into<String>) -> Self {
        TransformError::Compile {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        TransformError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
