//! Configuration for the probe module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for media probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Deadline for reading native duration metadata, in seconds.
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,

    /// Path to the metadata reader (ffprobe) binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Engine log markers that identify an audio stream.
    #[serde(default = "default_audio_markers")]
    pub audio_markers: Vec<String>,

    /// Lower bound of the heuristic duration, in seconds.
    #[serde(default = "default_fallback_min")]
    pub fallback_min_secs: f64,

    /// Seconds of media assumed per MiB of file when metadata is unavailable.
    #[serde(default = "default_fallback_per_mb")]
    pub fallback_secs_per_mb: f64,
}

fn default_metadata_timeout() -> u64 {
    8
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_audio_markers() -> Vec<String> {
    vec!["Audio:".to_string()]
}

fn default_fallback_min() -> f64 {
    60.0
}

fn default_fallback_per_mb() -> f64 {
    10.0
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: default_metadata_timeout(),
            ffprobe_path: default_ffprobe_path(),
            audio_markers: default_audio_markers(),
            fallback_min_secs: default_fallback_min(),
            fallback_secs_per_mb: default_fallback_per_mb(),
        }
    }
}

impl ProbeConfig {
    /// Metadata deadline.
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    /// Heuristic duration for a file of `size_mb` MiB.
    pub fn fallback_duration(&self, size_mb: f64) -> f64 {
        (size_mb * self.fallback_secs_per_mb).max(self.fallback_min_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProbeConfig::default();
        assert_eq!(config.metadata_timeout(), Duration::from_secs(8));
        assert_eq!(config.audio_markers, vec!["Audio:"]);
    }

    #[test]
    fn test_fallback_duration() {
        let config = ProbeConfig::default();
        assert_eq!(config.fallback_duration(0.0), 60.0);
        assert_eq!(config.fallback_duration(5.0), 60.0);
        assert_eq!(config.fallback_duration(10.0), 100.0);
        assert_eq!(config.fallback_duration(250.0), 2500.0);
    }
}
