//! Error types for virtual-extract
//!
//! Every failure that leaves the crate is classified into one [`Error`] variant.
//! Extraction failures always carry the offending source path, and subprocess
//! failures additionally carry the tool's exit code, so that a caller can tell
//! what went wrong without reading logs.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for virtual-extract operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for virtual-extract
#[derive(Debug, Error)]
pub enum Error {
    /// No signature matched and no extension override applied
    #[error("unsupported container format: {source_path}")]
    UnsupportedFormat {
        /// The file that could not be classified
        source_path: PathBuf,
    },

    /// An external extraction tool exited with a non-zero code
    #[error(
        "extraction of {source_path} into {destination} failed with exit code {code}: {diagnostic}"
    )]
    BackendExecutionFailure {
        /// Exit code reported by the tool (-1 when terminated by a signal)
        code: i32,
        /// The container being extracted
        source_path: PathBuf,
        /// Destination directory handed to the tool
        destination: PathBuf,
        /// Last lines the tool printed, if any
        diagnostic: String,
    },

    /// An in-process backend failed while parsing or reading a container
    #[error("failed to read {source_path}: {reason}")]
    BackendFault {
        /// The container being read
        source_path: PathBuf,
        /// What the backend tripped over
        reason: String,
    },

    /// A path value violated its invariants
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The offending path
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// External tool could not be located or launched
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// A unit of work submitted to the executor panicked or was aborted
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_parallelism")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::BackendFault`] for `source_path`
    pub fn fault(source_path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::BackendFault {
            source_path: source_path.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::BackendExecutionFailure { .. } => "backend_execution_failure",
            Error::BackendFault { .. } => "backend_fault",
            Error::InvalidPath { .. } => "invalid_path",
            Error::ExternalTool(_) => "external_tool_error",
            Error::TaskFailed(_) => "task_failed",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// The container this error is about, for the classified extraction variants
    pub fn source_path(&self) -> Option<&std::path::Path> {
        match self {
            Error::UnsupportedFormat { source_path }
            | Error::BackendExecutionFailure { source_path, .. }
            | Error::BackendFault { source_path, .. } => Some(source_path),
            _ => None,
        }
    }

    /// Whether this is one of the classified extraction failures
    pub fn is_extraction_failure(&self) -> bool {
        self.source_path().is_some()
    }

    /// Attach `source_path` to an unclassified error raised while a backend was running.
    ///
    /// Classified variants pass through untouched; anything else becomes a
    /// [`Error::BackendFault`] naming the source.
    pub(crate) fn classify_for(self, source_path: &std::path::Path) -> Self {
        if self.is_extraction_failure() {
            return self;
        }
        Error::BackendFault {
            source_path: source_path.to_path_buf(),
            reason: self.to_string(),
        }
    }
}
