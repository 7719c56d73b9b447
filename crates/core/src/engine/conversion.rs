//! Engine lifecycle and transcode commands.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, info, warn};

use crate::fetcher::ProgressiveFetcher;
use crate::formats::OutputFormat;
use crate::progress::{ByteProgress, ProgressEvent, ProgressOperation, ProgressReporter};
use crate::source::SourceFile;

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::{EngineAssets, EngineHandle, EngineLoader};

/// Progress of a first-time engine acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadProgress {
    /// A mirror attempt is starting. Byte counts restart from zero.
    Connecting { mirror: String },
    /// Payload bytes received from the current mirror.
    Downloading(ByteProgress),
    /// Both assets arrived; the engine is being initialized.
    Initializing { mirror: String },
}

/// Bytes produced by a transcode.
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    /// Encoded audio.
    pub bytes: Vec<u8>,
    /// Size of `bytes`.
    pub size_bytes: u64,
    /// MIME type of the output format.
    pub mime_type: String,
}

/// Owns the engine for one session and issues commands to it.
///
/// The engine is acquired on first use and reused afterwards. Dropping
/// the `ConversionEngine` drops the handle.
pub struct ConversionEngine {
    config: EngineConfig,
    fetcher: ProgressiveFetcher,
    loader: Arc<dyn EngineLoader>,
    handle: OnceCell<EngineHandle>,
}

impl ConversionEngine {
    /// Creates a conversion engine that acquires its engine through `loader`.
    pub fn new(
        config: EngineConfig,
        fetcher: ProgressiveFetcher,
        loader: Arc<dyn EngineLoader>,
    ) -> Self {
        Self {
            config,
            fetcher,
            loader,
            handle: OnceCell::new(),
        }
    }

    /// Creates a conversion engine around an already initialized engine.
    pub fn with_handle(
        config: EngineConfig,
        fetcher: ProgressiveFetcher,
        loader: Arc<dyn EngineLoader>,
        handle: EngineHandle,
    ) -> Self {
        Self {
            config,
            fetcher,
            loader,
            handle: OnceCell::new_with(Some(handle)),
        }
    }

    /// Whether the engine has been loaded in this session.
    pub fn is_loaded(&self) -> bool {
        self.handle.initialized()
    }

    /// The loaded engine, if any.
    pub fn handle(&self) -> Option<EngineHandle> {
        self.handle.get().cloned()
    }

    /// Returns the session's engine, acquiring it on first call.
    ///
    /// Concurrent callers share a single acquisition. A failed acquisition
    /// leaves the engine unloaded so a later call retries from scratch.
    pub async fn ensure_loaded<F>(&self, on_progress: F) -> Result<EngineHandle, EngineError>
    where
        F: FnMut(LoadProgress),
    {
        let handle = self
            .handle
            .get_or_try_init(|| self.acquire(on_progress))
            .await?;
        Ok(Arc::clone(handle))
    }

    /// Tries each mirror in order until one yields a working engine.
    async fn acquire<F>(&self, mut on_progress: F) -> Result<EngineHandle, EngineError>
    where
        F: FnMut(LoadProgress),
    {
        let timeout = self.config.load_timeout();
        let mut failures = Vec::with_capacity(self.config.mirrors.len());

        for mirror in &self.config.mirrors {
            info!("Loading engine from {}", mirror);
            on_progress(LoadProgress::Connecting {
                mirror: mirror.clone(),
            });

            let attempt = async {
                let module = self.fetcher.fetch(&self.config.module_url(mirror), |_| {}).await?;
                let payload = self
                    .fetcher
                    .fetch(&self.config.payload_url(mirror), |p| {
                        on_progress(LoadProgress::Downloading(p))
                    })
                    .await?;

                on_progress(LoadProgress::Initializing {
                    mirror: mirror.clone(),
                });

                self.loader
                    .load(EngineAssets {
                        module,
                        payload,
                        mirror: mirror.clone(),
                    })
                    .await
            };

            let err = match tokio::time::timeout(timeout, attempt).await {
                Ok(Ok(handle)) => {
                    info!("Engine loaded from {}", mirror);
                    return Ok(handle);
                }
                Ok(Err(e)) => e,
                Err(_) => EngineError::LoadTimeout {
                    mirror: mirror.clone(),
                    timeout_secs: timeout.as_secs(),
                },
            };

            warn!("Engine load from {} failed: {}", mirror, err);
            failures.push(format!("{}: {}", mirror, err));
        }

        Err(EngineError::Load { failures })
    }

    /// Stages a source file into the engine workspace.
    ///
    /// Returns the workspace name, which keeps the original extension so the
    /// engine can detect the container format.
    pub async fn write_input<F>(
        &self,
        handle: &EngineHandle,
        file: &SourceFile,
        mut on_bytes: F,
    ) -> Result<String, EngineError>
    where
        F: FnMut(ByteProgress),
    {
        let name = input_name(file);
        let read_err = |source: std::io::Error| EngineError::ReadInput {
            path: file.path.clone(),
            source,
        };

        let mut reader = tokio::fs::File::open(&file.path).await.map_err(read_err)?;
        let chunk_size = self.config.staging_chunk_size.max(1);
        let mut data = Vec::with_capacity(file.size_bytes as usize);
        let mut chunk = vec![0u8; chunk_size];
        let mut received: u64 = 0;

        on_bytes(ByteProgress {
            received: 0,
            total: Some(file.size_bytes),
        });

        loop {
            let n = reader.read(&mut chunk).await.map_err(read_err)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            received += n as u64;
            on_bytes(ByteProgress {
                received,
                total: Some(file.size_bytes.max(received)),
            });
        }

        handle.write_file(&name, &data).await?;
        debug!("Staged {} ({} bytes) as {}", file.name, received, name);
        Ok(name)
    }

    /// Removes a staged input from the engine workspace. Missing files are ignored.
    pub async fn remove_input(&self, handle: &EngineHandle, input_name: &str) {
        match handle.delete_file(input_name).await {
            Ok(()) | Err(EngineError::FileNotFound { .. }) => {}
            Err(e) => warn!("Failed to remove staged input {}: {}", input_name, e),
        }
    }

    /// Extracts the audio track of a staged input into `format`.
    ///
    /// The engine-side output file is deleted whether or not the command
    /// succeeds. Progress restarts at 0 for every call.
    pub async fn transcode(
        &self,
        handle: &EngineHandle,
        input_name: &str,
        format: &OutputFormat,
        progress_tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    ) -> Result<TranscodeOutput, EngineError> {
        let output_name = format.output_name();
        let args = build_transcode_args(input_name, format);
        let mut reporter = ProgressReporter::start(ProgressOperation::Transcode, progress_tx);

        info!("Transcoding {} to {} ({})", input_name, output_name, format.encoder);

        let (fraction_tx, mut fraction_rx) = mpsc::channel::<f64>(64);
        let exec = handle.exec(&args, Some(fraction_tx));
        let forward = async {
            while let Some(fraction) = fraction_rx.recv().await {
                reporter.report_fraction(fraction);
            }
        };
        let (outcome, ()) = tokio::join!(exec, forward);

        let result = match outcome {
            Ok(output) if output.success() => handle.read_file(&output_name).await,
            Ok(output) => {
                let message = output
                    .error_summary()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("engine exited with code {}", output.exit_code));
                Err(EngineError::transcode(message, Some(output.joined_log())))
            }
            Err(e) => Err(EngineError::transcode(e.to_string(), None)),
        };

        match handle.delete_file(&output_name).await {
            Ok(()) | Err(EngineError::FileNotFound { .. }) => {}
            Err(e) => warn!("Failed to remove engine output {}: {}", output_name, e),
        }

        let bytes = result?;
        reporter.finish();

        let size_bytes = bytes.len() as u64;
        info!("Transcode produced {} bytes of {}", size_bytes, format.mime_type);

        Ok(TranscodeOutput {
            bytes,
            size_bytes,
            mime_type: format.mime_type.clone(),
        })
    }
}

/// Workspace name for a staged input.
pub fn input_name(file: &SourceFile) -> String {
    match file.extension() {
        Some(ext) => format!("input.{}", ext),
        None => "input".to_string(),
    }
}

/// Builds the audio extraction command for a format.
pub fn build_transcode_args(input_name: &str, format: &OutputFormat) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input_name.to_string(),
        // Drop video
        "-vn".to_string(),
        "-acodec".to_string(),
        format.encoder.clone(),
    ];
    args.extend(format.quality_args.iter().cloned());
    args.push(format.output_name());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FormatCatalog;
    use std::path::PathBuf;

    fn source(name: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(name),
            name: name.to_string(),
            size_bytes: 0,
            media_type: "video/mp4".to_string(),
        }
    }

    #[test]
    fn test_input_name_preserves_extension() {
        assert_eq!(input_name(&source("My Holiday.MKV")), "input.MKV");
        assert_eq!(input_name(&source("clip.mp4")), "input.mp4");
        assert_eq!(input_name(&source("capture")), "input");
    }

    #[test]
    fn test_transcode_args_mp3() {
        let catalog = FormatCatalog::builtin();
        let args = build_transcode_args("input.mp4", catalog.get("mp3").unwrap());
        assert_eq!(
            args,
            vec![
                "-i", "input.mp4", "-vn", "-acodec", "libmp3lame", "-b:a", "192k", "output.mp3"
            ]
        );
    }

    #[test]
    fn test_transcode_args_without_quality_flags() {
        let catalog = FormatCatalog::builtin();
        let args = build_transcode_args("input.mov", catalog.get("wav").unwrap());
        assert_eq!(
            args,
            vec!["-i", "input.mov", "-vn", "-acodec", "pcm_s16le", "output.wav"]
        );
    }
}
