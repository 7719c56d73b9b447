//! FFmpeg-based engine implementation.
//!
//! The engine payload is an ffmpeg executable. Each loaded engine gets a
//! private working directory that plays the role of the engine's file
//! space; workspace names are plain file names inside that directory.

use async_trait::async_trait;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::{Engine, EngineAssets, EngineHandle, EngineLoader, EngineManifest, ExecOutput};

/// FFmpeg executable driven as a transcoding engine.
pub struct FfmpegEngine {
    binary: PathBuf,
    work_dir: PathBuf,
    manifest: EngineManifest,
    log_level: String,
    extra_args: Vec<String>,
}

impl FfmpegEngine {
    /// Creates an engine around an installed executable and a workspace directory.
    pub fn new(binary: PathBuf, work_dir: PathBuf, manifest: EngineManifest) -> Self {
        Self {
            binary,
            work_dir,
            manifest,
            log_level: "info".to_string(),
            extra_args: Vec::new(),
        }
    }

    /// Sets the engine log level.
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    /// Sets additional global arguments.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// The workspace directory.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Resolves a workspace name to a path, rejecting anything that is not
    /// a plain file name.
    fn workspace_path(&self, name: &str) -> Result<PathBuf, EngineError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\');
        if !valid {
            return Err(EngineError::InvalidFileName {
                name: name.to_string(),
            });
        }
        Ok(self.work_dir.join(name))
    }

    /// Builds the full argument list: global options first, then the command.
    fn build_args(&self, args: &[String], with_progress: bool) -> Vec<String> {
        let mut full = vec![
            "-nostdin".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
        ];

        if with_progress {
            full.extend(["-progress".to_string(), "pipe:2".to_string()]);
        }

        full.extend(self.extra_args.iter().cloned());
        full.extend(args.iter().cloned());
        full
    }

    /// Parses an input duration line like `  Duration: 00:01:02.50, start: ...`.
    fn parse_duration_line(re: &Regex, line: &str) -> Option<f64> {
        let caps = re.captures(line)?;
        let hours = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let minutes = caps.get(2)?.as_str().parse::<f64>().ok()?;
        let seconds = caps.get(3)?.as_str().parse::<f64>().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    }

    /// Parses a `-progress` line `out_time_ms=...` into seconds.
    ///
    /// Despite the name, ffmpeg reports microseconds here.
    fn parse_out_time(re: &Regex, line: &str) -> Option<f64> {
        let caps = re.captures(line)?;
        let micros = caps.get(1)?.as_str().parse::<f64>().ok()?;
        Some(micros / 1_000_000.0)
    }

    /// Whether a line is a `-progress` key=value record rather than a diagnostic.
    fn is_progress_record(line: &str) -> bool {
        match line.split_once('=') {
            Some((key, value)) => {
                !key.is_empty()
                    && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && !value.contains(' ')
            }
            None => false,
        }
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.work_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove engine workspace {:?}: {}", self.work_dir, e);
            }
        }
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn manifest(&self) -> &EngineManifest {
        &self.manifest
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.workspace_path(name)?;
        tokio::fs::write(&path, data).await?;
        debug!("Wrote {} bytes to workspace file {}", data.len(), name);
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.workspace_path(name)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::FileNotFound {
                    name: name.to_string(),
                }
            } else {
                EngineError::Io(e)
            }
        })
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let path = self.workspace_path(name)?;
        tokio::fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::FileNotFound {
                    name: name.to_string(),
                }
            } else {
                EngineError::Io(e)
            }
        })
    }

    async fn exec(
        &self,
        args: &[String],
        progress: Option<mpsc::Sender<f64>>,
    ) -> Result<ExecOutput, EngineError> {
        let full_args = self.build_args(args, progress.is_some());
        debug!("Running {:?} {:?}", self.binary, full_args);

        let mut child = Command::new(&self.binary)
            .args(&full_args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Exec {
                reason: format!("{}: {}", self.binary.display(), e),
            })?;

        let stderr = child.stderr.take().ok_or_else(|| EngineError::Exec {
            reason: "stderr was not captured".to_string(),
        })?;
        let mut reader = BufReader::new(stderr);

        let duration_regex = Regex::new(r"Duration: (\d+):(\d+):(\d+(?:\.\d+)?)").ok();
        let time_regex = Regex::new(r"^out_time_ms=(\d+)").ok();

        let mut log = Vec::new();
        let mut duration_secs: Option<f64> = None;

        let mut raw = Vec::new();
        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw).await? == 0 {
                break;
            }
            // Metadata tags are echoed verbatim and need not be UTF-8.
            let line = String::from_utf8_lossy(&raw)
                .trim_end_matches(['\n', '\r'])
                .to_string();

            if Self::is_progress_record(&line) {
                if let (Some(tx), Some(re), Some(total)) = (&progress, &time_regex, duration_secs) {
                    if let Some(current) = Self::parse_out_time(re, &line) {
                        if total > 0.0 {
                            // Non-blocking send
                            let _ = tx.try_send((current / total).clamp(0.0, 1.0));
                        }
                    }
                }
                continue;
            }

            if duration_secs.is_none() {
                if let Some(ref re) = duration_regex {
                    duration_secs = Self::parse_duration_line(re, &line);
                }
            }

            log.push(line);
        }

        let status = child.wait().await?;
        let exit_code = status.code().unwrap_or(-1);
        debug!("Engine exited with code {}", exit_code);

        Ok(ExecOutput { exit_code, log })
    }
}

/// Installs downloaded ffmpeg assets and verifies they run.
pub struct FfmpegLoader {
    config: EngineConfig,
}

impl FfmpegLoader {
    /// Creates a loader with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    async fn install_payload(&self, payload: &[u8]) -> Result<PathBuf, EngineError> {
        let binary = self.config.install_dir.join(&self.config.payload_file);
        tokio::fs::write(&binary, payload).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).await?;
        }

        Ok(binary)
    }

    async fn verify(binary: &Path) -> Result<String, EngineError> {
        let output = Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::init_failed(format!("{}: {}", binary.display(), e)))?;

        if !output.status.success() {
            return Err(EngineError::init_failed(format!(
                "version check exited with code {:?}",
                output.status.code()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl EngineLoader for FfmpegLoader {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn load(&self, assets: EngineAssets) -> Result<EngineHandle, EngineError> {
        let manifest = EngineManifest::parse(&assets.module)?;

        tokio::fs::create_dir_all(&self.config.install_dir).await?;
        tokio::fs::write(
            self.config.install_dir.join(&self.config.module_file),
            &assets.module,
        )
        .await?;
        let binary = self.install_payload(&assets.payload).await?;

        let banner = Self::verify(&binary).await?;
        info!(
            "Engine {} {} ready from {} ({})",
            manifest.name, manifest.version, assets.mirror, banner
        );

        let work_dir = self
            .config
            .install_dir
            .join("work")
            .join(uuid::Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&work_dir).await?;

        let engine = FfmpegEngine::new(binary, work_dir, manifest)
            .with_log_level(self.config.log_level.clone())
            .with_extra_args(self.config.extra_args.clone());

        Ok(Arc::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest() -> EngineManifest {
        EngineManifest {
            name: "ffmpeg".to_string(),
            version: "test".to_string(),
            audio_markers: Vec::new(),
        }
    }

    fn engine_in(dir: &TempDir) -> FfmpegEngine {
        let work_dir = dir.path().join("work");
        std::fs::create_dir_all(&work_dir).unwrap();
        FfmpegEngine::new(PathBuf::from("ffmpeg"), work_dir, manifest())
    }

    #[test]
    fn test_build_args_globals_first() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir).with_extra_args(vec!["-threads".to_string(), "2".to_string()]);
        let args = engine.build_args(
            &["-i".to_string(), "input.mp4".to_string(), "output.mp3".to_string()],
            true,
        );

        assert_eq!(&args[..4], &["-nostdin", "-y", "-loglevel", "info"]);
        assert_eq!(&args[4..6], &["-progress", "pipe:2"]);
        assert_eq!(&args[6..8], &["-threads", "2"]);
        assert_eq!(args.last().unwrap(), "output.mp3");
    }

    #[test]
    fn test_build_args_without_progress() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        let args = engine.build_args(&["-i".to_string(), "input.mp4".to_string()], false);
        assert!(!args.contains(&"-progress".to_string()));
    }

    #[test]
    fn test_parse_duration_line() {
        let re = Regex::new(r"Duration: (\d+):(\d+):(\d+(?:\.\d+)?)").unwrap();
        let secs = FfmpegEngine::parse_duration_line(
            &re,
            "  Duration: 01:02:03.50, start: 0.000000, bitrate: 1205 kb/s",
        )
        .unwrap();
        assert!((secs - 3723.5).abs() < 0.001);
        assert!(FfmpegEngine::parse_duration_line(&re, "  Duration: N/A, bitrate: N/A").is_none());
    }

    #[test]
    fn test_parse_out_time() {
        let re = Regex::new(r"^out_time_ms=(\d+)").unwrap();
        let secs = FfmpegEngine::parse_out_time(&re, "out_time_ms=1500000").unwrap();
        assert!((secs - 1.5).abs() < 0.001);
        assert!(FfmpegEngine::parse_out_time(&re, "out_time=00:00:01.50").is_none());
    }

    #[test]
    fn test_progress_records_are_not_diagnostics() {
        assert!(FfmpegEngine::is_progress_record("out_time_ms=1500000"));
        assert!(FfmpegEngine::is_progress_record("progress=continue"));
        assert!(FfmpegEngine::is_progress_record("speed=1.5x"));
        assert!(!FfmpegEngine::is_progress_record(
            "  Stream #0:1(und): Audio: aac (LC), 44100 Hz, stereo"
        ));
        assert!(!FfmpegEngine::is_progress_record(
            "  encoder         : Lavf60.3.100"
        ));
    }

    #[tokio::test]
    async fn test_workspace_files() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        engine.write_file("input.mp4", b"video").await.unwrap();
        assert_eq!(engine.read_file("input.mp4").await.unwrap(), b"video");

        engine.delete_file("input.mp4").await.unwrap();
        let err = engine.read_file("input.mp4").await.unwrap_err();
        assert!(matches!(err, EngineError::FileNotFound { .. }));
        let err = engine.delete_file("input.mp4").await.unwrap_err();
        assert!(matches!(err, EngineError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_workspace_rejects_paths() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        for name in ["", "..", "../escape.mp4", "nested/input.mp4"] {
            let err = engine.write_file(name, b"x").await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidFileName { .. }), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_exec_missing_binary() {
        let dir = TempDir::new().unwrap();
        let work_dir = dir.path().join("work");
        std::fs::create_dir_all(&work_dir).unwrap();
        let engine = FfmpegEngine::new(dir.path().join("does-not-exist"), work_dir, manifest());

        let err = engine.exec(&["-version".to_string()], None).await.unwrap_err();
        assert!(matches!(err, EngineError::Exec { .. }));
    }

    #[tokio::test]
    async fn test_drop_removes_workspace() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        let work_dir = engine.work_dir().to_path_buf();
        engine.write_file("input.mp4", b"video").await.unwrap();

        drop(engine);
        assert!(!work_dir.exists());
    }

    #[cfg(unix)]
    mod script_payload {
        use super::*;

        const FAKE_FFMPEG: &str = r#"#!/bin/sh
if [ "$1" = "-version" ]; then
  echo "ffmpeg version 6.1-test"
  exit 0
fi
echo "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'input.mp4':" >&2
echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 500 kb/s" >&2
printf '    title           : Caf\351\n' >&2
echo "  Stream #0:0(und): Video: h264, yuv420p, 1280x720" >&2
echo "  Stream #0:1(und): Audio: aac (LC), 44100 Hz, stereo" >&2
echo "out_time_ms=5000000" >&2
echo "progress=continue" >&2
echo "At least one output file must be specified" >&2
exit 1
"#;

        fn assets() -> EngineAssets {
            EngineAssets {
                module: b"name = \"ffmpeg\"\nversion = \"6.1-test\"\n".to_vec(),
                payload: FAKE_FFMPEG.as_bytes().to_vec(),
                mirror: "http://mirror.test".to_string(),
            }
        }

        #[tokio::test]
        async fn test_loader_installs_and_verifies() {
            let dir = TempDir::new().unwrap();
            let loader = FfmpegLoader::new(
                EngineConfig::default().with_install_dir(dir.path().join("engine")),
            );

            let engine = loader.load(assets()).await.unwrap();
            assert_eq!(engine.name(), "ffmpeg");
            assert_eq!(engine.manifest().version, "6.1-test");
            assert!(dir.path().join("engine").join("engine.toml").exists());
            assert!(dir.path().join("engine").join("ffmpeg").exists());
        }

        #[tokio::test]
        async fn test_exec_collects_log_and_progress() {
            let dir = TempDir::new().unwrap();
            let loader = FfmpegLoader::new(
                EngineConfig::default().with_install_dir(dir.path().join("engine")),
            );
            let engine = loader.load(assets()).await.unwrap();

            let (tx, mut rx) = mpsc::channel(8);
            let output = engine
                .exec(&["-i".to_string(), "input.mp4".to_string()], Some(tx))
                .await
                .unwrap();

            assert_eq!(output.exit_code, 1);
            assert!(output.log_contains_any(&["Audio:".to_string()]));
            assert!(output.log.iter().all(|l| !l.starts_with("out_time_ms")));
            assert_eq!(rx.recv().await, Some(0.5));
        }

        #[tokio::test]
        async fn test_exec_tolerates_non_utf8_metadata() {
            let dir = TempDir::new().unwrap();
            let loader = FfmpegLoader::new(
                EngineConfig::default().with_install_dir(dir.path().join("engine")),
            );
            let engine = loader.load(assets()).await.unwrap();

            let output = engine
                .exec(&["-hide_banner".to_string(), "-i".to_string(), "input.mp4".to_string()], None)
                .await
                .unwrap();

            assert!(output
                .log
                .iter()
                .any(|l| l == "    title           : Caf\u{FFFD}"));
            assert!(output.log_contains_any(&["Audio:".to_string()]));
        }

        #[tokio::test]
        async fn test_audio_detected_despite_latin1_tags() {
            use crate::probe::{MediaProbe, ProbeConfig};
            use crate::testing::MockDurationSource;

            let dir = TempDir::new().unwrap();
            let loader = FfmpegLoader::new(
                EngineConfig::default().with_install_dir(dir.path().join("engine")),
            );
            let engine = loader.load(assets()).await.unwrap();
            let probe = MediaProbe::new(
                ProbeConfig::default(),
                Arc::new(MockDurationSource::with_duration(10.0)),
            );

            assert!(probe.has_audio_stream(&engine, "input.mp4").await);
        }

        #[tokio::test]
        async fn test_loader_rejects_broken_payload() {
            let dir = TempDir::new().unwrap();
            let loader = FfmpegLoader::new(
                EngineConfig::default().with_install_dir(dir.path().join("engine")),
            );
            let mut assets = assets();
            assets.payload = b"#!/bin/sh\nexit 3\n".to_vec();

            let err = loader.load(assets).await.err().unwrap();
            assert!(matches!(err, EngineError::InitFailed { .. }));
        }
    }
}
