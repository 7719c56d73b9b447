//! Duration metadata via ffprobe.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::error::ProbeError;
use super::DurationSource;

/// Reads container duration with an ffprobe executable.
pub struct FfprobeDurationSource {
    ffprobe_path: PathBuf,
}

impl FfprobeDurationSource {
    /// Creates a source using the given ffprobe binary.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Parses ffprobe JSON output into a duration in seconds.
    fn parse_duration(output: &str) -> Result<f64, ProbeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: Option<ProbeFormat>,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            duration: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| {
            ProbeError::invalid_duration(format!("failed to parse ffprobe output: {}", e))
        })?;

        // Container duration first, longest stream duration otherwise.
        let from_format = probe
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok());
        let from_streams = probe
            .streams
            .iter()
            .filter_map(|s| s.duration.as_ref())
            .filter_map(|d| d.parse::<f64>().ok())
            .fold(None, |max: Option<f64>, d| Some(max.map_or(d, |m| m.max(d))));

        from_format
            .or(from_streams)
            .ok_or_else(|| ProbeError::invalid_duration("no duration in metadata"))
    }
}

#[async_trait]
impl DurationSource for FfprobeDurationSource {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ProbeError::unavailable(format!("{}: {}", self.ffprobe_path.display(), e))
            })?;

        if !output.status.success() {
            return Err(ProbeError::unavailable(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Self::parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}
