//! Typed error hierarchy for Mission Control.
//!
//! One enum per subsystem:
//! - `StorageError`: durable key-value storage failures
//! - `PreferenceError`: preference adapter failures (storage + JSON codec)
//! - `StreamError`: log fetch and stream read failures
//! - `TerminalError` / `ViewerError`: viewport lifecycle misuse

use thiserror::Error;

/// Message shown when a response arrived but no body reader could be obtained.
pub const UNABLE_TO_READ_STREAM: &str = "Unable to read stream";

/// Message shown for network failures, non-OK statuses and read-loop failures.
pub const ERROR_FETCHING_LOG: &str = "Error fetching log";

/// Errors from the persistent key-value storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("Storage I/O failed for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the preference store adapter.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to encode preference '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode preference '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from fetching or reading a remote log stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Invalid log URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Log request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Log endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("Response has no readable body")]
    NoBody,

    #[error("Log stream read failed: {0}")]
    Read(String),
}

impl StreamError {
    /// The short message surfaced in the viewer's error panel.
    pub fn user_message(&self) -> &'static str {
        match self {
            StreamError::NoBody => UNABLE_TO_READ_STREAM,
            StreamError::InvalidUrl { .. }
            | StreamError::Request(_)
            | StreamError::Status { .. }
            | StreamError::Read(_) => ERROR_FETCHING_LOG,
        }
    }
}

/// Errors from the terminal viewport.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TerminalError {
    #[error("Terminal has been disposed")]
    Disposed,

    #[error("Terminal requires non-zero rows and columns (got {cols}x{rows})")]
    InvalidSize { cols: u16, rows: u16 },
}

/// Errors from driving a log viewer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewerError {
    #[error("Log viewer is closed")]
    Closed,

    #[error("Log viewer has no target URL")]
    NoTarget,

    #[error(transparent)]
    Terminal(#[from] TerminalError),
}
