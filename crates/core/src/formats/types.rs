//! Types for the formats module.

use serde::{Deserialize, Serialize};

/// An output audio format the engine can encode to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormat {
    /// Stable identifier (e.g., "mp3").
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// File extension without the leading dot.
    pub extension: String,
    /// Engine encoder name (e.g., "libmp3lame").
    pub encoder: String,
    /// MIME type of the produced container.
    pub mime_type: String,
    /// Extra encoder quality arguments appended after the codec selection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality_args: Vec<String>,
}

impl OutputFormat {
    /// Creates a format without quality arguments.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        extension: impl Into<String>,
        encoder: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            extension: extension.into(),
            encoder: encoder.into(),
            mime_type: mime_type.into(),
            quality_args: Vec::new(),
        }
    }

    /// Sets the quality arguments.
    pub fn with_quality_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quality_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Output name inside the engine workspace.
    pub fn output_name(&self) -> String {
        format!("output.{}", self.extension)
    }

    /// Suggested download filename for a source basename.
    pub fn filename_for(&self, basename: &str) -> String {
        format!("{}.{}", basename, self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name_uses_extension() {
        let format = OutputFormat::new("aac", "AAC", "m4a", "aac", "audio/mp4");
        assert_eq!(format.output_name(), "output.m4a");
        assert_eq!(format.filename_for("holiday"), "holiday.m4a");
    }

    #[test]
    fn test_quality_args_skipped_when_empty() {
        let format = OutputFormat::new("wav", "WAV", "wav", "pcm_s16le", "audio/wav");
        let json = serde_json::to_string(&format).unwrap();
        assert!(!json.contains("quality_args"));

        let parsed: OutputFormat = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, format);
    }
}
