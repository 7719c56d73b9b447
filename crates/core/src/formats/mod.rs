//! Output format catalog.
//!
//! The catalog is an ordered list of audio formats. The first entry is the
//! default selection. Built-in formats come first, formats supplied through
//! configuration are appended after them.

mod types;

pub use types::OutputFormat;

use once_cell::sync::Lazy;

static BUILTIN_FORMATS: Lazy<Vec<OutputFormat>> = Lazy::new(|| {
    vec![
        OutputFormat::new("mp3", "MP3", "mp3", "libmp3lame", "audio/mpeg")
            .with_quality_args(["-b:a", "192k"]),
        OutputFormat::new("wav", "WAV", "wav", "pcm_s16le", "audio/wav"),
        OutputFormat::new("aac", "AAC", "m4a", "aac", "audio/mp4")
            .with_quality_args(["-b:a", "192k"]),
        OutputFormat::new("ogg", "OGG Vorbis", "ogg", "libvorbis", "audio/ogg")
            .with_quality_args(["-q:a", "5"]),
        OutputFormat::new("flac", "FLAC", "flac", "flac", "audio/flac"),
    ]
});

/// Ordered registry of supported output formats.
#[derive(Debug, Clone)]
pub struct FormatCatalog {
    formats: Vec<OutputFormat>,
}

impl Default for FormatCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FormatCatalog {
    /// The five built-in formats.
    pub fn builtin() -> Self {
        Self {
            formats: BUILTIN_FORMATS.clone(),
        }
    }

    /// Appends extra formats after the existing ones.
    pub fn with_extra(mut self, extra: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.formats.extend(extra);
        self
    }

    /// All formats in display order.
    pub fn list(&self) -> &[OutputFormat] {
        &self.formats
    }

    /// The default selection (first entry).
    pub fn default_format(&self) -> &OutputFormat {
        // The built-in set is never empty and entries are only appended.
        &self.formats[0]
    }

    /// Looks up a format by identifier.
    pub fn get(&self, id: &str) -> Option<&OutputFormat> {
        self.formats.iter().find(|f| f.id == id)
    }

    /// Number of formats.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Whether the catalog has no formats.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_has_five_formats() {
        let catalog = FormatCatalog::builtin();
        let ids: Vec<&str> = catalog.list().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["mp3", "wav", "aac", "ogg", "flac"]);
    }

    #[test]
    fn test_default_is_first() {
        let catalog = FormatCatalog::builtin();
        assert_eq!(catalog.default_format().id, "mp3");
        assert_eq!(catalog.default_format().mime_type, "audio/mpeg");
    }

    #[test]
    fn test_extensions_and_mime_types_distinct() {
        let catalog = FormatCatalog::builtin();
        let mut extensions = HashSet::new();
        let mut mime_types = HashSet::new();
        let mut ids = HashSet::new();

        for format in catalog.list() {
            assert!(!format.extension.is_empty());
            assert!(!format.mime_type.is_empty());
            assert!(extensions.insert(format.extension.clone()));
            assert!(mime_types.insert(format.mime_type.clone()));
            assert!(ids.insert(format.id.clone()));
        }
    }

    #[test]
    fn test_encoder_names() {
        let catalog = FormatCatalog::builtin();
        assert_eq!(catalog.get("mp3").unwrap().encoder, "libmp3lame");
        assert_eq!(catalog.get("ogg").unwrap().encoder, "libvorbis");
        assert_eq!(catalog.get("wav").unwrap().encoder, "pcm_s16le");
        assert!(catalog.get("wav").unwrap().quality_args.is_empty());
        assert_eq!(catalog.get("ogg").unwrap().quality_args, vec!["-q:a", "5"]);
    }

    #[test]
    fn test_with_extra_appends() {
        let catalog = FormatCatalog::builtin().with_extra([OutputFormat::new(
            "opus",
            "Opus",
            "opus",
            "libopus",
            "audio/opus",
        )]);
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.default_format().id, "mp3");
        assert_eq!(catalog.list().last().unwrap().id, "opus");
    }

    #[test]
    fn test_get_unknown() {
        assert!(FormatCatalog::builtin().get("wma").is_none());
    }
}
