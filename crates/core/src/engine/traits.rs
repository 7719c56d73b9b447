//! Trait definitions for the engine module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::error::EngineError;

/// Shared handle to an initialized engine.
pub type EngineHandle = Arc<dyn Engine>;

/// Description shipped alongside the engine payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineManifest {
    /// Engine name (e.g., "ffmpeg").
    pub name: String,
    /// Engine version string.
    pub version: String,
    /// Log markers that identify an audio stream. Empty means use the
    /// configured defaults. Blank entries are dropped on parse.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio_markers: Vec<String>,
}

impl EngineManifest {
    /// Parses a TOML manifest.
    pub fn parse(bytes: &[u8]) -> Result<Self, EngineError> {
        let text = std::str::from_utf8(bytes).map_err(|e| EngineError::InvalidManifest {
            reason: e.to_string(),
        })?;
        let mut manifest: Self = toml::from_str(text).map_err(|e| EngineError::InvalidManifest {
            reason: e.to_string(),
        })?;
        manifest.audio_markers.retain(|m| !m.trim().is_empty());
        Ok(manifest)
    }
}

/// The two artifacts downloaded from a mirror.
#[derive(Debug, Clone)]
pub struct EngineAssets {
    /// The code module (engine manifest).
    pub module: Vec<u8>,
    /// The binary payload (engine executable).
    pub payload: Vec<u8>,
    /// Base URL of the mirror that served them.
    pub mirror: String,
}

/// Outcome of an engine command.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    /// Process exit code (0 on success).
    pub exit_code: i32,
    /// Diagnostic log lines, in emission order.
    pub log: Vec<String>,
}

impl ExecOutput {
    /// Whether the command reported success.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Whether any log line contains one of `markers`. Blank markers never match.
    pub fn log_contains_any(&self, markers: &[String]) -> bool {
        self.log.iter().any(|line| {
            markers
                .iter()
                .filter(|m| !m.trim().is_empty())
                .any(|m| line.contains(m.as_str()))
        })
    }

    /// The most relevant error line from the log.
    pub fn error_summary(&self) -> Option<&str> {
        self.log
            .iter()
            .rev()
            .find(|line| line.contains("Error") || line.contains("error"))
            .or_else(|| self.log.last())
            .map(|line| line.trim())
    }

    /// The full log joined by newlines.
    pub fn joined_log(&self) -> String {
        self.log.join("\n")
    }
}

/// A transcoding engine with its own working file space.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Returns the manifest the engine was loaded with.
    fn manifest(&self) -> &EngineManifest;

    /// Writes a file into the engine workspace.
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Reads a file from the engine workspace.
    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    /// Deletes a file from the engine workspace.
    async fn delete_file(&self, name: &str) -> Result<(), EngineError>;

    /// Runs a command.
    ///
    /// A command that runs but exits non-zero is `Ok` with a non-zero
    /// `exit_code`; `Err` means the engine could not run it at all.
    /// Fractional completion (0.0 - 1.0) is sent on `progress` when given.
    async fn exec(
        &self,
        args: &[String],
        progress: Option<mpsc::Sender<f64>>,
    ) -> Result<ExecOutput, EngineError>;
}

/// Turns downloaded assets into a runnable engine.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    /// Returns the name of this loader implementation.
    fn name(&self) -> &str;

    /// Initializes an engine from the given assets.
    async fn load(&self, assets: EngineAssets) -> Result<EngineHandle, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parse() {
        let manifest = EngineManifest::parse(
            br#"
name = "ffmpeg"
version = "6.1"
audio_markers = ["Audio:", "audio:"]
"#,
        )
        .unwrap();
        assert_eq!(manifest.name, "ffmpeg");
        assert_eq!(manifest.version, "6.1");
        assert_eq!(manifest.audio_markers.len(), 2);
    }

    #[test]
    fn test_manifest_markers_optional() {
        let manifest = EngineManifest::parse(b"name = \"ffmpeg\"\nversion = \"6.1\"\n").unwrap();
        assert!(manifest.audio_markers.is_empty());
    }

    #[test]
    fn test_manifest_drops_blank_markers() {
        let manifest = EngineManifest::parse(
            br#"
name = "ffmpeg"
version = "6.1"
audio_markers = ["", "Audio:", "  "]
"#,
        )
        .unwrap();
        assert_eq!(manifest.audio_markers, vec!["Audio:".to_string()]);

        let manifest = EngineManifest::parse(
            br#"
name = "ffmpeg"
version = "6.1"
audio_markers = [""]
"#,
        )
        .unwrap();
        assert!(manifest.audio_markers.is_empty());
    }

    #[test]
    fn test_manifest_invalid() {
        let err = EngineManifest::parse(b"\xff\xfe").unwrap_err();
        assert!(matches!(err, EngineError::InvalidManifest { .. }));

        let err = EngineManifest::parse(b"version = 3").unwrap_err();
        assert!(matches!(err, EngineError::InvalidManifest { .. }));
    }

    #[test]
    fn test_exec_output_markers() {
        let output = ExecOutput {
            exit_code: 1,
            log: vec![
                "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input.mp4':".to_string(),
                "  Stream #0:1(und): Audio: aac (LC), 44100 Hz, stereo".to_string(),
                "At least one output file must be specified".to_string(),
            ],
        };
        assert!(!output.success());
        assert!(output.log_contains_any(&["Audio:".to_string()]));
        assert!(!output.log_contains_any(&["Subtitle:".to_string()]));
    }

    #[test]
    fn test_blank_markers_never_match() {
        let output = ExecOutput {
            exit_code: 1,
            log: vec!["  Stream #0:0(und): Video: h264, yuv420p, 1280x720".to_string()],
        };
        assert!(!output.log_contains_any(&[String::new()]));
        assert!(!output.log_contains_any(&["Audio:".to_string(), " ".to_string()]));
    }

    #[test]
    fn test_error_summary_prefers_error_lines() {
        let output = ExecOutput {
            exit_code: 1,
            log: vec![
                "Error opening output file output.mp3.".to_string(),
                "Conversion failed!".to_string(),
            ],
        };
        assert_eq!(output.error_summary(), Some("Error opening output file output.mp3."));

        let output = ExecOutput {
            exit_code: 1,
            log: vec!["Conversion failed!".to_string()],
        };
        assert_eq!(output.error_summary(), Some("Conversion failed!"));
        assert_eq!(ExecOutput::default().error_summary(), None);
    }
}
