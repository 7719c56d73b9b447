//! Error types for the pipeline.

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;

use super::PipelineState;

/// Message shown when a non-video file is dropped.
pub const INVALID_INPUT_MESSAGE: &str = "Please drop a video file";

/// Errors returned by the pipeline controller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The dropped file is not a video.
    #[error("{}", INVALID_INPUT_MESSAGE)]
    InvalidInput { media_type: String },

    /// The operation is not allowed in the current state.
    #[error("Cannot {operation}: pipeline is {state}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    /// Unknown output format identifier.
    #[error("Unknown output format: {id}")]
    InvalidFormat { id: String },

    /// The probe found no audio stream to extract.
    #[error("This file has no audio track to extract")]
    NoAudio,

    /// Required engine step failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The session could not be configured.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub(crate) fn invalid_state(operation: &'static str, state: PipelineState) -> Self {
        Self::InvalidState { operation, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LOAD_FAILED_MESSAGE;

    #[test]
    fn test_invalid_input_message() {
        let err = PipelineError::InvalidInput {
            media_type: "text/plain".to_string(),
        };
        assert_eq!(err.to_string(), "Please drop a video file");
    }

    #[test]
    fn test_engine_message_is_verbatim() {
        let err: PipelineError = EngineError::Load {
            failures: vec!["https://a: timed out".to_string()],
        }
        .into();
        assert_eq!(err.to_string(), LOAD_FAILED_MESSAGE);
    }

    #[test]
    fn test_invalid_state_message() {
        let err = PipelineError::invalid_state("convert", PipelineState::Idle);
        assert_eq!(err.to_string(), "Cannot convert: pipeline is idle");
    }
}
