//! Session context: everything one pipeline needs, built once.

use std::sync::Arc;

use tracing::debug;

use crate::blob::BlobRegistry;
use crate::config::{validate_config, Config};
use crate::engine::{ConversionEngine, EngineError, EngineHandle, EngineLoader, FfmpegLoader};
use crate::fetcher::ProgressiveFetcher;
use crate::formats::{FormatCatalog, OutputFormat};
use crate::probe::{DurationSource, FfprobeDurationSource, MediaProbe};

use super::PipelineError;

/// Owns the session-scoped resources: the engine (and its lazily loaded
/// handle), the probe, the format catalog and the blob store.
///
/// Dropping the session drops the engine handle.
pub struct Session {
    engine: ConversionEngine,
    probe: MediaProbe,
    catalog: FormatCatalog,
    blobs: BlobRegistry,
    default_format: String,
}

impl Session {
    /// Builds a production session: engine from the configured mirrors,
    /// durations from ffprobe.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        Self::builder(config.clone()).build()
    }

    pub fn builder(config: Config) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }

    pub fn probe(&self) -> &MediaProbe {
        &self.probe
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    /// The format selected when a pipeline starts.
    pub fn default_format(&self) -> &OutputFormat {
        self.catalog
            .get(&self.default_format)
            .unwrap_or_else(|| self.catalog.default_format())
    }
}

/// Builder for [`Session`]. Any collaborator not supplied gets its
/// production implementation.
pub struct SessionBuilder {
    config: Config,
    loader: Option<Arc<dyn EngineLoader>>,
    duration_source: Option<Arc<dyn DurationSource>>,
    fetcher: Option<ProgressiveFetcher>,
    handle: Option<EngineHandle>,
    blobs: Option<BlobRegistry>,
}

impl SessionBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            loader: None,
            duration_source: None,
            fetcher: None,
            handle: None,
            blobs: None,
        }
    }

    /// Engine loader used on first acquisition.
    pub fn loader(mut self, loader: Arc<dyn EngineLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Metadata reader for durations.
    pub fn duration_source(mut self, source: Arc<dyn DurationSource>) -> Self {
        self.duration_source = Some(source);
        self
    }

    pub fn fetcher(mut self, fetcher: ProgressiveFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Start with an engine that is already loaded.
    pub fn engine_handle(mut self, handle: EngineHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Share an existing blob store.
    pub fn blobs(mut self, blobs: BlobRegistry) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Validates the configuration and assembles the session.
    pub fn build(self) -> Result<Session, PipelineError> {
        validate_config(&self.config)?;

        let engine_config = self.config.engine.clone();
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => ProgressiveFetcher::new().map_err(EngineError::from)?,
        };
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(FfmpegLoader::new(engine_config.clone())));
        let duration_source = self.duration_source.unwrap_or_else(|| {
            Arc::new(FfprobeDurationSource::new(
                self.config.probe.ffprobe_path.clone(),
            ))
        });

        debug!(
            "Building session with loader {} and duration source {}",
            loader.name(),
            duration_source.name()
        );

        let engine = match self.handle {
            Some(handle) => ConversionEngine::with_handle(engine_config, fetcher, loader, handle),
            None => ConversionEngine::new(engine_config, fetcher, loader),
        };

        Ok(Session {
            engine,
            probe: MediaProbe::new(self.config.probe.clone(), duration_source),
            catalog: self.config.catalog(),
            blobs: self.blobs.unwrap_or_default(),
            default_format: self.config.output.default_format.clone(),
        })
    }
}
