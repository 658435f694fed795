//! Error types for the Trellis framework.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a view engine.
///
/// The renderer logs these and falls back to a fixed message; they never
/// reach the dispatcher.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The view file could not be read.
    #[error("cannot read view '{path}': {source}")]
    Io {
        /// The view path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The view contains an unterminated or unknown directive.
    #[error("invalid view '{path}': {reason}")]
    Syntax {
        /// The view path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

impl ViewError {
    pub fn syntax(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for view rendering.
pub type ViewResult<T> = Result<T, ViewError>;
