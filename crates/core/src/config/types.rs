use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::formats::{FormatCatalog, OutputFormat};
use crate::probe::ProbeConfig;

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub formats: FormatsConfig,
}

impl Config {
    /// Built-in formats followed by the configured extras.
    pub fn catalog(&self) -> FormatCatalog {
        FormatCatalog::builtin().with_extra(self.formats.extra.iter().cloned())
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Format selected when a file is picked.
    #[serde(default = "default_format_id")]
    pub default_format: String,
    /// Directory results are written to by the command line tool.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: default_format_id(),
            dir: default_output_dir(),
        }
    }
}

fn default_format_id() -> String {
    "mp3".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Additional output formats
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FormatsConfig {
    /// Appended after the built-in formats.
    #[serde(default)]
    pub extra: Vec<OutputFormat>,
}
