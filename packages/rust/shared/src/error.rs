//! Error types for factlearn.
//!
//! Library crates use [`LearnError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all factlearn operations.
#[derive(Debug, thiserror::Error)]
pub enum LearnError {
    /// Configuration loading or parser registration error. Raised at load time.
    #[error("config error: {message}")]
    Config { message: String },

    /// Command output or template body could not be decoded to text.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// An operation or execution record did not resolve to exactly one match.
    #[error("lookup error: {message}")]
    Lookup { message: String },

    /// A single parser failed. Recovered by the learning pipeline.
    #[error("parser '{parser}' failed: {message}")]
    Parser { parser: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LearnError>;

impl LearnError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a lookup error from any displayable message.
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup {
            message: msg.into(),
        }
    }

    /// Create a parser failure attributed to the named parser.
    pub fn parser(parser: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Parser {
            parser: parser.into(),
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
