use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::formats::FormatCatalog;

/// Validate configuration
/// Currently validates:
/// - At least one engine mirror
/// - Engine load and metadata timeouts are not 0
/// - At least one audio marker, none of them blank
/// - Extra formats are complete, and their ids, extensions and mime types
///   don't collide with each other or with built-ins
/// - The default output format exists
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Engine validation
    if config.engine.mirrors.is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.mirrors must contain at least one mirror".to_string(),
        ));
    }
    if config.engine.load_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "engine.load_timeout_secs cannot be 0".to_string(),
        ));
    }

    // Probe validation
    if config.probe.metadata_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "probe.metadata_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.probe.audio_markers.is_empty() {
        return Err(ConfigError::ValidationError(
            "probe.audio_markers must contain at least one marker".to_string(),
        ));
    }
    // A blank marker matches every log line
    if config.probe.audio_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "probe.audio_markers cannot contain blank markers".to_string(),
        ));
    }

    // Format validation
    let builtin = FormatCatalog::builtin();
    let mut ids: HashSet<&str> = HashSet::new();
    let mut extensions: HashSet<String> = HashSet::new();
    let mut mime_types: HashSet<String> = HashSet::new();
    for format in builtin.list() {
        ids.insert(&format.id);
        extensions.insert(format.extension.to_ascii_lowercase());
        mime_types.insert(format.mime_type.to_ascii_lowercase());
    }

    for format in &config.formats.extra {
        if format.id.is_empty()
            || format.extension.is_empty()
            || format.encoder.is_empty()
            || format.mime_type.is_empty()
        {
            return Err(ConfigError::ValidationError(format!(
                "formats.extra entry '{}' needs id, extension, encoder and mime_type",
                format.id
            )));
        }
        if !ids.insert(&format.id) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate output format id '{}'",
                format.id
            )));
        }
        if !extensions.insert(format.extension.to_ascii_lowercase()) {
            return Err(ConfigError::ValidationError(format!(
                "output format '{}' reuses extension '{}'",
                format.id, format.extension
            )));
        }
        if !mime_types.insert(format.mime_type.to_ascii_lowercase()) {
            return Err(ConfigError::ValidationError(format!(
                "output format '{}' reuses mime type '{}'",
                format.id, format.mime_type
            )));
        }
    }

    if !ids.contains(config.output.default_format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "output.default_format '{}' is not a known format",
            config.output.default_format
        )));
    }

    Ok(())
}
