//! Notebook error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Notebook JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notebook has no cells")]
    EmptyCells,

    #[error("Unsupported notebook format {0}")]
    UnsupportedFormat(u32),
}

impl NotebookError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
