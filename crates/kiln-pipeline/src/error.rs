//! Task errors.

use std::path::Path;

use kiln_server::ServerError;
use kiln_transforms::TransformError;

/// Errors that can occur while running tasks.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing build input {0}; run the develop pipeline first")]
    MissingBuildInput(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Task '{0}' did not run to completion")]
    Aborted(String),
}

impl TaskError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        TaskError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<ServerError> for TaskError {
    fn from(e: ServerError) -> Self {
        TaskError::Server(e.to_string())
    }
}
