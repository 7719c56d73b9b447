//! Testing utilities and mock implementations.
//!
//! Mocks for the engine boundary and the metadata reader, so the whole
//! pipeline can be exercised without downloading or running a real engine.
//!
//! # Example
//!
//! ```rust,ignore
//! use extractor_core::testing::{MockDurationSource, MockEngineLoader};
//!
//! let loader = MockEngineLoader::new();
//! loader.engine().set_inspection(false, 1).await; // video-only input
//!
//! let session = Session::builder(config)
//!     .loader(Arc::new(loader.clone()))
//!     .duration_source(Arc::new(MockDurationSource::with_duration(120.0)))
//!     .build()?;
//! ```

mod mock_duration;
mod mock_engine;
mod mock_loader;

pub use mock_duration::MockDurationSource;
pub use mock_engine::{inspection_log_video_only, inspection_log_with_audio, MockEngine};
pub use mock_loader::{MockEngineLoader, RecordedLoad};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::source::SourceFile;

    /// Engine manifest served by test mirrors.
    pub const ENGINE_MANIFEST: &str = "name = \"mock\"\nversion = \"0.0.0\"\n";

    /// Write a fake video file of `size_bytes` into `dir`.
    pub fn video_file(dir: &Path, name: &str, size_bytes: usize) -> std::io::Result<PathBuf> {
        let path = dir.join(name);
        std::fs::write(&path, vec![0x42u8; size_bytes])?;
        Ok(path)
    }

    /// Snapshot a fixture with an explicit media type.
    pub fn source_file(path: &Path, media_type: &str) -> std::io::Result<SourceFile> {
        let metadata = std::fs::metadata(path)?;
        Ok(SourceFile {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size_bytes: metadata.len(),
            media_type: media_type.to_string(),
        })
    }
}
