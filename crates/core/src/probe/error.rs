//! Error types for the probe module.

use thiserror::Error;

/// Errors from reading native media metadata.
///
/// These never leave [`MediaProbe`](super::MediaProbe); they select the
/// heuristic fallback instead.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Metadata did not load before the deadline.
    #[error("Metadata did not load within {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The metadata reader could not run or rejected the file.
    #[error("Metadata unavailable: {reason}")]
    Unavailable { reason: String },

    /// Metadata loaded but did not contain a usable duration.
    #[error("Invalid duration: {reason}")]
    InvalidDuration { reason: String },
}

impl ProbeError {
    /// Creates an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates an invalid duration error.
    pub fn invalid_duration(reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            reason: reason.into(),
        }
    }
}
