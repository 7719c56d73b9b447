//! Transcoding engine acquisition and control.
//!
//! The engine is an external transcoder that is downloaded at runtime from
//! one of several equivalent mirrors. Each mirror hosts two artifacts: a
//! small code module (the engine manifest) and a large binary payload.
//!
//! - [`Engine`] is the command boundary: a private file space plus `exec`.
//! - [`EngineLoader`] turns downloaded assets into a running [`Engine`].
//! - [`ConversionEngine`] owns the engine for one session, acquiring it on
//!   first use, and issues staging and transcode commands.
//!
//! # Example
//!
//! ```ignore
//! use extractor_core::engine::{ConversionEngine, EngineConfig, FfmpegLoader};
//! use extractor_core::fetcher::ProgressiveFetcher;
//!
//! let config = EngineConfig::default();
//! let engine = ConversionEngine::new(
//!     config.clone(),
//!     ProgressiveFetcher::new()?,
//!     Arc::new(FfmpegLoader::new(config)),
//! );
//!
//! let handle = engine.ensure_loaded(|_| {}).await?;
//! let input = engine.write_input(&handle, &source, |_| {}).await?;
//! let output = engine.transcode(&handle, &input, catalog.default_format(), None).await?;
//! ```

mod config;
mod conversion;
mod error;
mod ffmpeg;
mod traits;

pub use config::EngineConfig;
pub use conversion::{
    build_transcode_args, input_name, ConversionEngine, LoadProgress, TranscodeOutput,
};
pub use error::{EngineError, LOAD_FAILED_MESSAGE};
pub use ffmpeg::{FfmpegEngine, FfmpegLoader};
pub use traits::{Engine, EngineAssets, EngineHandle, EngineLoader, EngineManifest, ExecOutput};
