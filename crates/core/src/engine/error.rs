//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

use crate::fetcher::FetchError;

/// User-facing message when no mirror could provide a working engine.
pub const LOAD_FAILED_MESSAGE: &str =
    "Failed to load the converter. Please check your network connection and try again.";

/// Errors that can occur while acquiring or driving the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Every mirror failed to provide a working engine.
    #[error("{}", LOAD_FAILED_MESSAGE)]
    Load {
        /// Per-mirror failure descriptions, in attempt order.
        failures: Vec<String>,
    },

    /// Downloading an engine asset failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The engine manifest could not be parsed.
    #[error("Invalid engine manifest: {reason}")]
    InvalidManifest { reason: String },

    /// The downloaded engine could not be started.
    #[error("Engine initialization failed: {reason}")]
    InitFailed { reason: String },

    /// A mirror attempt did not finish before its deadline.
    #[error("Engine load from {mirror} timed out after {timeout_secs} seconds")]
    LoadTimeout { mirror: String, timeout_secs: u64 },

    /// The source file could not be read.
    #[error("Failed to read {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A workspace file name was rejected.
    #[error("Invalid workspace file name: {name}")]
    InvalidFileName { name: String },

    /// A workspace file does not exist.
    #[error("File not found in engine workspace: {name}")]
    FileNotFound { name: String },

    /// The engine process could not be run.
    #[error("Failed to run engine: {reason}")]
    Exec { reason: String },

    /// The transcode command reported failure.
    #[error("Conversion failed: {message}")]
    Transcode {
        message: String,
        log: Option<String>,
    },

    /// I/O error inside the engine workspace.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a transcode error with the engine log attached.
    pub fn transcode(message: impl Into<String>, log: Option<String>) -> Self {
        Self::Transcode {
            message: message.into(),
            log,
        }
    }

    /// Creates an initialization error.
    pub fn init_failed(reason: impl Into<String>) -> Self {
        Self::InitFailed {
            reason: reason.into(),
        }
    }
}
