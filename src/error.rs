//! Error types for the catalog pipeline
//!
//! Two layers: [`ItemError`] is recoverable and collected per stage,
//! [`CatalogError`] aborts the current invocation.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while processing a single item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// I/O error during file operations
    IoError,
    /// Path cannot be represented as UTF-8
    InvalidPath,
    /// The guessing capability rejected the input
    GuessFailed,
    /// The metadata service call failed for this input
    ServiceFailed,
}

/// A recoverable failure tied to one file or one input string
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct ItemError {
    /// The kind of error
    pub kind: ItemErrorKind,
    /// The path or input where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
    /// When the error was recorded
    pub at: DateTime<Utc>,
}

impl ItemError {
    /// Create a new item error stamped with the current time
    pub fn new(kind: ItemErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
            at: Utc::now(),
        }
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        let message = format!("Not found: {:?}", path);
        Self::new(ItemErrorKind::NotFound, Some(path), message)
    }

    /// Create an error for a path that is not valid UTF-8
    pub fn invalid_path(path: PathBuf) -> Self {
        let message = format!("Path is not valid UTF-8: {:?}", path);
        Self::new(ItemErrorKind::InvalidPath, Some(path), message)
    }

    /// Create a guess failure for the given input
    pub fn guess_failed(input: impl Into<PathBuf>, err: &GuessError) -> Self {
        Self::new(ItemErrorKind::GuessFailed, Some(input.into()), err.to_string())
    }

    /// Record a recoverable enrichment failure for `input`
    pub fn service_failed(input: &str, err: &CatalogError) -> Self {
        Self::new(ItemErrorKind::ServiceFailed, Some(PathBuf::from(input)), err.to_string())
    }

    /// Attach a path to an error converted from `std::io::Error`
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }
}

impl From<std::io::Error> for ItemError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ItemErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => ItemErrorKind::NotFound,
            _ => ItemErrorKind::IoError,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<walkdir::Error> for ItemError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let kind = match err.io_error().map(|e| e.kind()) {
            Some(std::io::ErrorKind::PermissionDenied) => ItemErrorKind::PermissionDenied,
            Some(std::io::ErrorKind::NotFound) => ItemErrorKind::NotFound,
            _ => ItemErrorKind::IoError,
        };
        Self::new(kind, path, err.to_string())
    }
}

/// Failure reported by a [`crate::guess::GuessMetadata`] implementation
#[derive(Debug, Error)]
pub enum GuessError {
    /// Nothing left to guess from after stripping the input
    #[error("empty input")]
    EmptyInput,
    /// Implementation-specific failure
    #[error("{0}")]
    Failed(String),
}

/// Fatal errors: the current stage or call cannot continue
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A required capability (HTTP client, guesser) could not be set up
    #[error("missing capability: {0}")]
    MissingCapability(String),

    /// The previous stage's checkpoint does not exist
    #[error("checkpoint not found: {0:?} (run the previous stage first)")]
    MissingCheckpoint(PathBuf),

    /// The checkpoint exists but cannot be read or parsed
    #[error("checkpoint {path:?} is unreadable: {message}")]
    CorruptCheckpoint { path: PathBuf, message: String },

    /// Writing a checkpoint failed
    #[error("failed to write checkpoint {path:?}: {source}")]
    CheckpointWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file is invalid
    #[error("invalid settings file {path:?}: {message}")]
    Config { path: PathBuf, message: String },

    /// No platform data directory and none given
    #[error("could not determine the application data directory")]
    NoDataDir,

    /// The guessing capability failed on a single enrichment input
    #[error("could not guess metadata for {input:?}: {source}")]
    GuessFailed {
        input: String,
        #[source]
        source: GuessError,
    },

    /// The metadata service could not be reached
    #[error("network error: {0}")]
    Network(String),

    /// The metadata service answered with a non-success status
    #[error("metadata service returned HTTP {status}")]
    ServiceStatus { status: u16 },

    /// The metadata service answered with something that is not JSON
    #[error("malformed response from metadata service: {0}")]
    MalformedResponse(String),
}

impl CatalogError {
    /// Whether the caller may reasonably move on to the next input
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CatalogError::GuessFailed { .. }
                | CatalogError::Network(_)
                | CatalogError::ServiceStatus { .. }
                | CatalogError::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CatalogError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            CatalogError::ServiceStatus {
                status: status.as_u16(),
            }
        } else {
            CatalogError::Network(err.to_string())
        }
    }
}

/// Log a batch of item errors as a single report
pub fn log_error_report(stage: &str, errors: &[ItemError]) {
    if errors.is_empty() {
        return;
    }
    log::error!("Errors found while {} ({} total).", stage, errors.len());
    for err in errors {
        log::error!("[{}] {}", err.at.format("%Y-%m-%d %H:%M:%S"), err);
    }
}
