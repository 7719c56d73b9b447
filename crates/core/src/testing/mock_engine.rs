//! Mock engine for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::engine::{Engine, EngineError, EngineManifest, ExecOutput};

/// Log emitted by the inspection command for a file with video and audio.
pub fn inspection_log_with_audio() -> Vec<String> {
    vec![
        "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input.mp4':".to_string(),
        "  Duration: 00:02:00.00, start: 0.000000, bitrate: 700 kb/s".to_string(),
        "  Stream #0:0(und): Video: h264 (High), yuv420p, 1280x720, 30 fps".to_string(),
        "  Stream #0:1(und): Audio: aac (LC), 44100 Hz, stereo, fltp, 128 kb/s".to_string(),
        "At least one output file must be specified".to_string(),
    ]
}

/// Log emitted by the inspection command for a video-only file.
pub fn inspection_log_video_only() -> Vec<String> {
    vec![
        "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input.mp4':".to_string(),
        "  Duration: 00:02:00.00, start: 0.000000, bitrate: 600 kb/s".to_string(),
        "  Stream #0:0(und): Video: h264 (High), yuv420p, 1280x720, 30 fps".to_string(),
        "At least one output file must be specified".to_string(),
    ]
}

/// Mock implementation of the Engine trait.
///
/// Keeps its workspace in memory and interprets two kinds of command:
/// - commands containing `-vn` are transcodes; the last argument is the
///   output name and a fake encoded file is written there
/// - anything else is an inspection and returns the configured log
///
/// Clones share state, so a test can keep one clone for assertions while
/// the pipeline holds another as its engine handle.
#[derive(Debug, Clone)]
pub struct MockEngine {
    manifest: EngineManifest,
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    commands: Arc<RwLock<Vec<Vec<String>>>>,
    inspection: Arc<RwLock<(Vec<String>, i32)>>,
    transcode_failure: Arc<RwLock<Option<String>>>,
    progress_fractions: Arc<RwLock<Vec<f64>>>,
    output_bytes: Arc<RwLock<Vec<u8>>>,
    next_exec_error: Arc<RwLock<Option<EngineError>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a mock engine that reports an audio stream.
    pub fn new() -> Self {
        Self {
            manifest: EngineManifest {
                name: "mock".to_string(),
                version: "0.0.0".to_string(),
                audio_markers: Vec::new(),
            },
            files: Arc::new(RwLock::new(HashMap::new())),
            commands: Arc::new(RwLock::new(Vec::new())),
            inspection: Arc::new(RwLock::new((inspection_log_with_audio(), 1))),
            transcode_failure: Arc::new(RwLock::new(None)),
            progress_fractions: Arc::new(RwLock::new(vec![0.25, 0.5, 0.75, 1.0])),
            output_bytes: Arc::new(RwLock::new(b"mock encoded audio".to_vec())),
            next_exec_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Declare audio markers in the manifest.
    pub fn with_audio_markers(mut self, markers: Vec<String>) -> Self {
        self.manifest.audio_markers = markers;
        self
    }

    /// Configure the inspection log to include or omit an audio stream.
    pub async fn set_inspection(&self, has_audio: bool, exit_code: i32) {
        let log = if has_audio {
            inspection_log_with_audio()
        } else {
            inspection_log_video_only()
        };
        *self.inspection.write().await = (log, exit_code);
    }

    /// Configure a raw inspection log.
    pub async fn set_inspection_log(&self, log: Vec<String>, exit_code: i32) {
        *self.inspection.write().await = (log, exit_code);
    }

    /// Make transcodes exit non-zero with `message` as the last log line.
    pub async fn set_transcode_failure(&self, message: Option<String>) {
        *self.transcode_failure.write().await = message;
    }

    /// Fractions sent during a transcode.
    pub async fn set_progress_fractions(&self, fractions: Vec<f64>) {
        *self.progress_fractions.write().await = fractions;
    }

    /// Bytes written as transcode output.
    pub async fn set_output_bytes(&self, bytes: Vec<u8>) {
        *self.output_bytes.write().await = bytes;
    }

    /// Make the next `exec` call fail to run.
    pub async fn set_next_exec_error(&self, error: EngineError) {
        *self.next_exec_error.write().await = Some(error);
    }

    /// All commands run so far.
    pub async fn commands(&self) -> Vec<Vec<String>> {
        self.commands.read().await.clone()
    }

    /// Transcode commands run so far.
    pub async fn transcode_commands(&self) -> Vec<Vec<String>> {
        self.commands
            .read()
            .await
            .iter()
            .filter(|args| args.iter().any(|a| a == "-vn"))
            .cloned()
            .collect()
    }

    /// Names of files currently in the workspace, sorted.
    pub async fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Contents of a workspace file.
    pub async fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.read().await.get(name).cloned()
    }

    async fn run_transcode(
        &self,
        args: &[String],
        progress: Option<mpsc::Sender<f64>>,
    ) -> ExecOutput {
        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .unwrap_or_default();
        let output = args.last().cloned().unwrap_or_default();

        if !self.files.read().await.contains_key(&input) {
            return ExecOutput {
                exit_code: 1,
                log: vec![format!("{}: No such file or directory", input)],
            };
        }

        if let Some(message) = self.transcode_failure.read().await.clone() {
            return ExecOutput {
                exit_code: 1,
                log: vec![
                    format!("Input #0, from '{}':", input),
                    message,
                ],
            };
        }

        if let Some(tx) = progress {
            for fraction in self.progress_fractions.read().await.iter() {
                let _ = tx.send(*fraction).await;
            }
        }

        let bytes = self.output_bytes.read().await.clone();
        self.files.write().await.insert(output.clone(), bytes);

        ExecOutput {
            exit_code: 0,
            log: vec![format!("Output #0, to '{}':", output)],
        }
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn manifest(&self) -> &EngineManifest {
        &self.manifest
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.files
            .write()
            .await
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.files
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::FileNotFound {
                name: name.to_string(),
            })
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        self.files
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::FileNotFound {
                name: name.to_string(),
            })
    }

    async fn exec(
        &self,
        args: &[String],
        progress: Option<mpsc::Sender<f64>>,
    ) -> Result<ExecOutput, EngineError> {
        self.commands.write().await.push(args.to_vec());

        if let Some(err) = self.next_exec_error.write().await.take() {
            return Err(err);
        }

        if args.iter().any(|a| a == "-vn") {
            return Ok(self.run_transcode(args, progress).await);
        }

        let (log, exit_code) = self.inspection.read().await.clone();
        Ok(ExecOutput { exit_code, log })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transcode_writes_output() {
        let engine = MockEngine::new();
        engine.write_file("input.mp4", b"video").await.unwrap();

        let args: Vec<String> = ["-i", "input.mp4", "-vn", "-acodec", "flac", "output.flac"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = engine.exec(&args, None).await.unwrap();

        assert!(output.success());
        assert_eq!(
            engine.file("output.flac").await,
            Some(b"mock encoded audio".to_vec())
        );
        assert_eq!(engine.transcode_commands().await.len(), 1);
    }

    #[tokio::test]
    async fn test_transcode_without_input_fails() {
        let engine = MockEngine::new();
        let args: Vec<String> = ["-i", "input.mp4", "-vn", "output.mp3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let output = engine.exec(&args, None).await.unwrap();
        assert_eq!(output.exit_code, 1);
    }

    #[tokio::test]
    async fn test_inspection_log() {
        let engine = MockEngine::new();
        engine.set_inspection(false, 1).await;
        let output = engine
            .exec(&["-i".to_string(), "input.mp4".to_string()], None)
            .await
            .unwrap();
        assert!(!output.log_contains_any(&["Audio:".to_string()]));
    }

    #[tokio::test]
    async fn test_next_exec_error_is_consumed() {
        let engine = MockEngine::new();
        engine
            .set_next_exec_error(EngineError::Exec {
                reason: "boom".to_string(),
            })
            .await;
        assert!(engine.exec(&[], None).await.is_err());
        assert!(engine.exec(&[], None).await.is_ok());
    }
}
