//! Error types for FoodFacts.
//!
//! Library crates use [`FoodFactsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all FoodFacts operations.
#[derive(Debug, thiserror::Error)]
pub enum FoodFactsError {
    /// Configuration loading or checking error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Request could not be sent, body could not be read, or the status was rejected.
    #[error("network error: {0}")]
    Network(String),

    /// Response body was not the expected JSON shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A render target selector did not resolve on the surface.
    #[error("container not found: {selector}")]
    ContainerNotFound { selector: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FoodFactsError>;

impl FoodFactsError {
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

    pub fn container_not_found(selector: impl Into<String>) -> Self {
        Self::ContainerNotFound {
            selector: selector.into(),
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
