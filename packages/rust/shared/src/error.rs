//! Error types for relaybuild.
//!
//! Library crates use [`RelayError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all relaybuild operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A compile was requested before the session was configured.
    #[error("compile invoked before configuration")]
    NotConfigured,

    /// Network/HTTP error while loading a host document.
    #[error("network error: {0}")]
    Network(String),

    /// A remote fragment could not be fetched; the aggregation was abandoned.
    #[error("failed to fetch fragment {location}: {message}")]
    FetchFailed { location: String, message: String },

    /// The compile request failed in transit or the response envelope was
    /// unreadable. Details are logged, never carried here.
    #[error("compile request failed: no usable response from the build service")]
    Transport,

    /// The build service could not run the request at all.
    #[error("build service fault: {reason}")]
    ServerFault { reason: String },

    /// The build service ran and rejected the input.
    #[error("compilation failed")]
    CompileFailure { diagnostics: String },

    /// Host document or location parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The host environment refused an artifact.
    #[error("failed to inject artifact {name}: {message}")]
    Injection { name: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
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

    /// Create an injection error for the named artifact.
    pub fn injection(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Injection {
            name: name.into(),
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
