//! Configuration for the engine module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for engine acquisition and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Mirror base URLs, tried in order. Each one hosts the same versioned
    /// module and payload.
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<String>,

    /// File name of the code module (engine manifest) on each mirror.
    #[serde(default = "default_module_file")]
    pub module_file: String,

    /// File name of the binary payload on each mirror.
    #[serde(default = "default_payload_file")]
    pub payload_file: String,

    /// Timeout for one mirror attempt (download + initialization) in seconds.
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,

    /// Directory the engine is installed into.
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// Chunk size used when staging input files.
    #[serde(default = "default_staging_chunk_size")]
    pub staging_chunk_size: usize,

    /// Engine log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    /// Stream detection needs at least "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional global engine arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_mirrors() -> Vec<String> {
    vec![
        "https://unpkg.com/@audio-extractor/engine@6.1.1/dist".to_string(),
        "https://cdn.jsdelivr.net/npm/@audio-extractor/engine@6.1.1/dist".to_string(),
    ]
}

fn default_module_file() -> String {
    "engine.toml".to_string()
}

fn default_payload_file() -> String {
    "ffmpeg".to_string()
}

fn default_load_timeout() -> u64 {
    300
}

fn default_install_dir() -> PathBuf {
    std::env::temp_dir().join("audio-extractor").join("engine")
}

fn default_staging_chunk_size() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mirrors: default_mirrors(),
            module_file: default_module_file(),
            payload_file: default_payload_file(),
            load_timeout_secs: default_load_timeout(),
            install_dir: default_install_dir(),
            staging_chunk_size: default_staging_chunk_size(),
            log_level: default_log_level(),
            extra_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Creates a config with custom mirrors.
    pub fn with_mirrors<I, S>(mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mirrors: mirrors.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Sets the install directory.
    pub fn with_install_dir(mut self, install_dir: PathBuf) -> Self {
        self.install_dir = install_dir;
        self
    }

    /// Sets the per-mirror load timeout in seconds.
    pub fn with_load_timeout(mut self, timeout_secs: u64) -> Self {
        self.load_timeout_secs = timeout_secs;
        self
    }

    /// Per-mirror load timeout.
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// URL of the code module on a mirror.
    pub fn module_url(&self, mirror: &str) -> String {
        format!("{}/{}", mirror.trim_end_matches('/'), self.module_file)
    }

    /// URL of the binary payload on a mirror.
    pub fn payload_url(&self, mirror: &str) -> String {
        format!("{}/{}", mirror.trim_end_matches('/'), self.payload_file)
    }
}
