pub mod blob;
pub mod config;
pub mod engine;
pub mod fetcher;
pub mod formats;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod source;
pub mod testing;

pub use blob::{Blob, BlobRegistry, BlobUrl};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, FormatsConfig, OutputConfig,
};
pub use engine::{
    ConversionEngine, Engine, EngineConfig, EngineError, EngineHandle, EngineLoader,
    FfmpegEngine, FfmpegLoader, LoadProgress, TranscodeOutput,
};
pub use fetcher::{FetchError, ProgressiveFetcher};
pub use formats::{FormatCatalog, OutputFormat};
pub use pipeline::{
    ConversionResult, LoadingStep, PipelineController, PipelineError, PipelineEvent,
    PipelineState, ReadyInfo, Session, StepStatus,
};
pub use probe::{DurationSource, MediaProbe, ProbeConfig, ProbeError, ProbeReport};
pub use progress::{ByteProgress, ProgressEvent, ProgressOperation, ProgressReporter};
pub use source::SourceFile;
