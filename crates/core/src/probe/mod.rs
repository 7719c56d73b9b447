//! Media probing: audio stream detection and duration estimation.
//!
//! Both probes are best effort. Audio detection reads the engine's
//! diagnostic log from an inspection command that is expected to exit with
//! an error, so only the log is consulted. Duration estimation races the
//! metadata reader against a deadline and falls back to a size-based
//! heuristic, so it always produces a value.

mod config;
mod error;
mod ffprobe;

pub use config::ProbeConfig;
pub use error::ProbeError;
pub use ffprobe::FfprobeDurationSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::engine::EngineHandle;
use crate::source::SourceFile;

/// Reads the duration of a media file from native metadata.
#[async_trait]
pub trait DurationSource: Send + Sync {
    /// Returns the name of this source implementation.
    fn name(&self) -> &str;

    /// Reads the duration in seconds.
    async fn duration(&self, path: &Path) -> Result<f64, ProbeError>;
}

/// Result of probing a staged file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Whether the engine reported an audio stream.
    pub has_audio: bool,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// True when `duration_secs` came from the heuristic.
    pub duration_estimated: bool,
}

/// Probes media files before conversion.
pub struct MediaProbe {
    config: ProbeConfig,
    source: Arc<dyn DurationSource>,
}

impl MediaProbe {
    /// Creates a probe with the given duration source.
    pub fn new(config: ProbeConfig, source: Arc<dyn DurationSource>) -> Self {
        Self { config, source }
    }

    /// Markers used for audio detection: the engine manifest's when it
    /// declares any non-blank one, the configured ones otherwise.
    pub fn audio_markers<'a>(&'a self, engine: &'a EngineHandle) -> &'a [String] {
        let declared = &engine.manifest().audio_markers;
        if declared.iter().all(|m| m.trim().is_empty()) {
            &self.config.audio_markers
        } else {
            declared
        }
    }

    /// Whether a staged input contains an audio stream.
    ///
    /// Runs an inspection command with no output. The command's own
    /// failure is ignored; only its diagnostic log matters.
    pub async fn has_audio_stream(&self, engine: &EngineHandle, input_name: &str) -> bool {
        let args = vec![
            "-hide_banner".to_string(),
            "-i".to_string(),
            input_name.to_string(),
        ];

        let output = match engine.exec(&args, None).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Inspection of {} could not run: {}", input_name, e);
                return false;
            }
        };

        let found = output.log_contains_any(self.audio_markers(engine));
        debug!(
            "Inspection of {} exited with {}; audio stream {}",
            input_name,
            output.exit_code,
            if found { "found" } else { "not found" }
        );
        found
    }

    /// Reads native duration metadata within the deadline.
    pub async fn read_duration(&self, file: &SourceFile) -> Result<f64, ProbeError> {
        let timeout = self.config.metadata_timeout();

        let secs = match tokio::time::timeout(timeout, self.source.duration(&file.path)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProbeError::Timeout {
                    timeout_secs: timeout.as_secs(),
                })
            }
        };

        if !secs.is_finite() || secs <= 0.0 {
            return Err(ProbeError::invalid_duration(format!("{} seconds", secs)));
        }
        Ok(secs)
    }

    /// Duration in seconds, falling back to `max(60, size_mb * 10)`.
    pub async fn estimate_duration(&self, file: &SourceFile) -> f64 {
        self.estimate(file).await.0
    }

    async fn estimate(&self, file: &SourceFile) -> (f64, bool) {
        match self.read_duration(file).await {
            Ok(secs) => (secs, false),
            Err(e) => {
                let secs = self.config.fallback_duration(file.size_mb());
                warn!(
                    "Duration of {} unavailable via {} ({}); estimating {:.0}s",
                    file.name,
                    self.source.name(),
                    e,
                    secs
                );
                (secs, true)
            }
        }
    }

    /// Runs audio detection and duration estimation.
    pub async fn probe(
        &self,
        engine: &EngineHandle,
        input_name: &str,
        file: &SourceFile,
    ) -> ProbeReport {
        let has_audio = self.has_audio_stream(engine, input_name).await;
        let (duration_secs, duration_estimated) = self.estimate(file).await;

        ProbeReport {
            has_audio,
            duration_secs,
            duration_estimated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockDurationSource, MockEngine};
    use std::path::PathBuf;
    use std::time::Duration;

    fn file_of_mb(mb: u64) -> SourceFile {
        SourceFile {
            path: PathBuf::from("/videos/clip.mp4"),
            name: "clip.mp4".to_string(),
            size_bytes: mb * 1024 * 1024,
            media_type: "video/mp4".to_string(),
        }
    }

    fn probe_with(source: MockDurationSource) -> MediaProbe {
        MediaProbe::new(ProbeConfig::default(), Arc::new(source))
    }

    #[tokio::test]
    async fn test_duration_from_metadata() {
        let probe = probe_with(MockDurationSource::with_duration(123.4));
        let secs = probe.estimate_duration(&file_of_mb(10)).await;
        assert!((secs - 123.4).abs() < 0.001);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_deadline_uses_heuristic() {
        let probe = probe_with(MockDurationSource::never_resolves());
        let secs = probe.estimate_duration(&file_of_mb(30)).await;
        assert_eq!(secs, 300.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_just_inside_deadline() {
        let probe = probe_with(
            MockDurationSource::with_duration(42.0).with_delay(Duration::from_millis(7900)),
        );
        assert_eq!(probe.estimate_duration(&file_of_mb(30)).await, 42.0);
    }

    #[tokio::test]
    async fn test_duration_error_uses_heuristic_minimum() {
        let probe = probe_with(MockDurationSource::failing());
        assert_eq!(probe.estimate_duration(&file_of_mb(2)).await, 60.0);
    }

    #[tokio::test]
    async fn test_invalid_duration_uses_heuristic() {
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let probe = probe_with(MockDurationSource::with_duration(bad));
            let err = probe.read_duration(&file_of_mb(20)).await.unwrap_err();
            assert!(matches!(err, ProbeError::InvalidDuration { .. }));
            assert_eq!(probe.estimate_duration(&file_of_mb(20)).await, 200.0);
        }
    }

    #[tokio::test]
    async fn test_audio_detected_despite_failed_command() {
        let engine = MockEngine::new();
        engine.set_inspection(true, 1).await;
        let handle: EngineHandle = Arc::new(engine);

        let probe = probe_with(MockDurationSource::with_duration(10.0));
        assert!(probe.has_audio_stream(&handle, "input.mp4").await);
    }

    #[tokio::test]
    async fn test_no_audio_detected_despite_successful_command() {
        let engine = MockEngine::new();
        engine.set_inspection(false, 0).await;
        let handle: EngineHandle = Arc::new(engine);

        let probe = probe_with(MockDurationSource::with_duration(10.0));
        assert!(!probe.has_audio_stream(&handle, "input.mp4").await);
    }

    #[tokio::test]
    async fn test_exec_failure_means_no_audio() {
        let engine = MockEngine::new();
        engine
            .set_next_exec_error(crate::engine::EngineError::Exec {
                reason: "engine crashed".to_string(),
            })
            .await;
        let handle: EngineHandle = Arc::new(engine);

        let probe = probe_with(MockDurationSource::with_duration(10.0));
        assert!(!probe.has_audio_stream(&handle, "input.mp4").await);
    }

    #[tokio::test]
    async fn test_manifest_markers_override_config() {
        let engine = MockEngine::new().with_audio_markers(vec!["Stream type=audio".to_string()]);
        engine
            .set_inspection_log(vec!["  Stream type=audio codec=aac".to_string()], 1)
            .await;
        let handle: EngineHandle = Arc::new(engine);

        let probe = probe_with(MockDurationSource::with_duration(10.0));
        assert_eq!(probe.audio_markers(&handle), &["Stream type=audio".to_string()]);
        assert!(probe.has_audio_stream(&handle, "input.mp4").await);
    }

    #[tokio::test]
    async fn test_blank_manifest_markers_do_not_match_video_only_files() {
        let engine = MockEngine::new().with_audio_markers(vec![String::new()]);
        engine.set_inspection(false, 1).await;
        let handle: EngineHandle = Arc::new(engine);

        let probe = probe_with(MockDurationSource::with_duration(10.0));
        assert_eq!(probe.audio_markers(&handle), &["Audio:".to_string()]);
        assert!(!probe.has_audio_stream(&handle, "input.mp4").await);
    }

    #[tokio::test]
    async fn test_probe_report() {
        let engine = MockEngine::new();
        let handle: EngineHandle = Arc::new(engine);
        let probe = probe_with(MockDurationSource::failing());

        let report = probe.probe(&handle, "input.mp4", &file_of_mb(10)).await;
        assert!(report.has_audio);
        assert_eq!(report.duration_secs, 100.0);
        assert!(report.duration_estimated);
    }
}
