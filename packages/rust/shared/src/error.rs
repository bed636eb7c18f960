//! Error types for nbdocs.
//!
//! Library crates use [`NbDocsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all nbdocs operations.
#[derive(Debug, thiserror::Error)]
pub enum NbDocsError {
    /// Configuration loading or directory layout error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed notebook or search-index JSON.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Data validation error (missing keys, paths outside the docs dir, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A notebook cell raised while being executed.
    #[error("cell {cell_index} raised {ename}: {evalue}")]
    CellExecution {
        cell_index: usize,
        ename: String,
        evalue: String,
    },

    /// The kernel engine could not run the notebook at all.
    #[error("execution error: {0}")]
    Execution(String),

    /// The external site builder failed.
    #[error("build error: {0}")]
    Build(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NbDocsError>;

impl NbDocsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
