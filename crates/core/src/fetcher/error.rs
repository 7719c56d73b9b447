//! Error types for the fetcher module.

use thiserror::Error;

/// User-facing message when no mirror could serve an asset.
pub const ACQUISITION_MESSAGE: &str =
    "Failed to download required files. Please check your network connection and try again.";

/// Errors that can occur while downloading assets.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A single request failed (bad status, connection error, broken body stream).
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// A single attempt did not settle before its deadline.
    #[error("Request to {url} timed out after {timeout_secs} seconds")]
    Timeout { url: String, timeout_secs: u64 },

    /// Every source failed.
    #[error("{}", ACQUISITION_MESSAGE)]
    Acquisition {
        /// Per-source failure descriptions, in attempt order.
        failures: Vec<String>,
    },

    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Creates a transport error for a URL.
    pub fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_message_hides_details() {
        let err = FetchError::Acquisition {
            failures: vec!["Request to https://a failed: connection refused".to_string()],
        };
        assert_eq!(err.to_string(), ACQUISITION_MESSAGE);
        assert!(!err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_transport_display() {
        let err = FetchError::transport("https://mirror/engine", "status 404");
        assert_eq!(
            err.to_string(),
            "Request to https://mirror/engine failed: status 404"
        );
    }
}
