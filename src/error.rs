//! Error types for the build pipelines.

use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

/// Fallback text when an underlying error carries no message.
pub const EMPTY_ERROR_MESSAGE: &str = "Empty error message.";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sass compilation failed.
    #[error("{}: {}", .path.display(), or_fallback(.message))]
    Sass { path: PathBuf, message: String },

    /// Parsing, prefixing or minifying compiled CSS failed.
    #[error("{}: {}", .path.display(), or_fallback(.message))]
    Css { path: PathBuf, message: String },

    /// Parsing or minifying a script failed.
    #[error("{}: {}", .path.display(), or_fallback(.message))]
    Script { path: PathBuf, message: String },

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid watch pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

fn or_fallback(message: &str) -> &str {
    if message.trim().is_empty() {
        EMPTY_ERROR_MESSAGE
    } else {
        message
    }
}
