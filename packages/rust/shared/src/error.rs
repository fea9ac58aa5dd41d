//! Error types for Graphloom.
//!
//! Library crates use [`GraphloomError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Graphloom operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphloomError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Storage layer error (backing store read/write).
    #[error("storage error: {0}")]
    Storage(String),

    /// Cache serialization or backing-store error.
    ///
    /// Callers at the cache boundary absorb this into a miss; it only
    /// propagates from the raw store layer.
    #[error("cache error: {0}")]
    Cache(String),

    /// A pipeline step could not be resolved against the registry.
    #[error("step resolution error: no step registered under '{name}'")]
    StepResolution { name: String },

    /// A pipeline step body failed.
    #[error("step '{step}' failed: {message}")]
    StepExecution { step: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unknown entity reference, invalid shape, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GraphloomError>;

impl GraphloomError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a step-execution error for the named step.
    pub fn step(step: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::StepExecution {
            step: step.into(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = GraphloomError::config("missing output dir");
        assert_eq!(err.to_string(), "config error: missing output dir");

        let err = GraphloomError::validation("relationship references unknown entity 'Bob'");
        assert!(err.to_string().contains("unknown entity 'Bob'"));
    }

    #[test]
    fn step_errors_name_the_step() {
        let err = GraphloomError::StepResolution {
            name: "extract_graph".into(),
        };
        assert!(err.to_string().contains("'extract_graph'"));

        let err = GraphloomError::step("finalize_graph", "no seeds in state");
        assert!(err.to_string().contains("finalize_graph"));
        assert!(err.to_string().contains("no seeds"));
    }
}
