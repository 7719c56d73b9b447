//! Source file snapshots.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A read-only snapshot of the file selected for conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Location on disk.
    pub path: PathBuf,
    /// File name including extension.
    pub name: String,
    /// Size in bytes at selection time.
    pub size_bytes: u64,
    /// Declared media (MIME) type.
    pub media_type: String,
}

impl SourceFile {
    /// Snapshots a file on disk.
    ///
    /// When `declared_type` is `None` the media type is derived from the
    /// file extension.
    pub async fn open(
        path: impl AsRef<Path>,
        declared_type: Option<String>,
    ) -> Result<Self, std::io::Error> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let media_type = declared_type.unwrap_or_else(|| media_type_for(&name).to_string());

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size_bytes: metadata.len(),
            media_type,
        })
    }

    /// Whether the declared media type is a video type.
    pub fn is_video(&self) -> bool {
        self.media_type.starts_with("video/")
    }

    /// File name without its extension.
    pub fn basename(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    /// Extension of the file name, if any.
    pub fn extension(&self) -> Option<&str> {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Size in mebibytes.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Guesses a media type from a file name's extension.
pub fn media_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        // Video
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "mpeg" | "mpg" => "video/mpeg",
        "ts" | "m2ts" => "video/mp2t",
        "3gp" => "video/3gpp",
        "ogv" => "video/ogg",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "opus" => "audio/opus",
        // Images and text that commonly get dropped by mistake
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot(name: &str, media_type: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(name),
            name: name.to_string(),
            size_bytes: 0,
            media_type: media_type.to_string(),
        }
    }

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for("clip.MP4"), "video/mp4");
        assert_eq!(media_type_for("movie.mkv"), "video/x-matroska");
        assert_eq!(media_type_for("song.mp3"), "audio/mpeg");
        assert_eq!(media_type_for("notes"), "application/octet-stream");
    }

    #[test]
    fn test_basename_and_extension() {
        let file = snapshot("holiday.trip.mov", "video/quicktime");
        assert_eq!(file.basename(), "holiday.trip");
        assert_eq!(file.extension(), Some("mov"));

        let file = snapshot("README", "text/plain");
        assert_eq!(file.basename(), "README");
        assert_eq!(file.extension(), None);

        let file = snapshot(".hidden", "application/octet-stream");
        assert_eq!(file.basename(), ".hidden");
        assert_eq!(file.extension(), None);
    }

    #[test]
    fn test_is_video() {
        assert!(snapshot("a.mp4", "video/mp4").is_video());
        assert!(!snapshot("a.mp3", "audio/mpeg").is_video());
    }

    #[tokio::test]
    async fn test_open_snapshots_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.webm");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let file = SourceFile::open(&path, None).await.unwrap();
        assert_eq!(file.name, "clip.webm");
        assert_eq!(file.size_bytes, 2048);
        assert_eq!(file.media_type, "video/webm");

        let declared = SourceFile::open(&path, Some("text/plain".to_string()))
            .await
            .unwrap();
        assert_eq!(declared.media_type, "text/plain");
    }

    #[tokio::test]
    async fn test_open_rejects_directories() {
        let dir = TempDir::new().unwrap();
        assert!(SourceFile::open(dir.path(), None).await.is_err());
        assert!(SourceFile::open(dir.path().join("missing.mp4"), None)
            .await
            .is_err());
    }
}
