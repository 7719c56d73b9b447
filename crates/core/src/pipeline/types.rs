//! Pipeline data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::blob::BlobUrl;
use crate::progress::ProgressEvent;

/// Where the pipeline is in the analyze → confirm → convert → deliver flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Waiting for a file.
    Idle,
    /// Loading the engine, staging and probing the file.
    Loading,
    /// Probe finished; waiting for the user to confirm.
    Ready,
    /// Transcode in progress.
    Converting,
    /// A result is available.
    Done,
    /// The last operation failed.
    Error,
}

impl PipelineState {
    /// Returns the state as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Loading => "loading",
            PipelineState::Ready => "ready",
            PipelineState::Converting => "converting",
            PipelineState::Done => "done",
            PipelineState::Error => "error",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a loading step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Done,
}

/// One visible sub-stage of the Loading state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingStep {
    /// Stable identifier (`download`, `engine`, `read`, `analyze`).
    pub id: String,
    /// Human-readable label.
    pub label: String,
    pub status: StepStatus,
    /// Percentage for steps that report progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl LoadingStep {
    pub(crate) fn pending(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            status: StepStatus::Pending,
            progress: None,
        }
    }
}

/// Step identifiers.
pub mod step {
    pub const DOWNLOAD: &str = "download";
    pub const ENGINE: &str = "engine";
    pub const READ: &str = "read";
    pub const ANALYZE: &str = "analyze";
}

/// Builds the step sequence for an analysis.
///
/// The download step only appears when the engine has not been loaded in
/// this session yet.
pub fn loading_steps(engine_loaded: bool) -> Vec<LoadingStep> {
    let mut steps = Vec::with_capacity(4);
    if !engine_loaded {
        steps.push(LoadingStep::pending(step::DOWNLOAD, "Download converter"));
    }
    steps.push(LoadingStep::pending(step::ENGINE, "Start converter"));
    steps.push(LoadingStep::pending(step::READ, "Read file"));
    steps.push(LoadingStep::pending(step::ANALYZE, "Analyze audio"));
    steps
}

/// What the user sees at the Ready decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyInfo {
    /// Name of the selected file.
    pub file_name: String,
    pub size_bytes: u64,
    pub has_audio: bool,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// True when the duration is a size-based estimate.
    pub duration_estimated: bool,
    /// Selected output format id.
    pub format_id: String,
    /// `<basename>.<extension>` for the selected format.
    pub suggested_filename: String,
}

/// A finished conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Registered blob holding the encoded audio.
    pub blob: BlobUrl,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Suggested download name.
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

/// Notification emitted by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StateChanged(PipelineState),
    StepsChanged(Vec<LoadingStep>),
    Progress(ProgressEvent),
    Ready(ReadyInfo),
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_use_steps() {
        let ids: Vec<String> = loading_steps(false).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["download", "engine", "read", "analyze"]);
    }

    #[test]
    fn test_cached_engine_steps() {
        let steps = loading_steps(true);
        let ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["engine", "read", "analyze"]);
        assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Converting.to_string(), "converting");
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&PipelineState::Ready).unwrap();
        assert_eq!(json, "\"ready\"");
    }
}
