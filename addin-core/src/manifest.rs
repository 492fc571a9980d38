//! Sidecar manifest reader
//!
//! Every add-in binary ships with a `key=value` manifest next to it, named
//! after the binary with the extension replaced (`tracer.so` → `tracer.ini`).
//!
//! ```text
//! display_name=Tracer
//! author=gb
//! version=1.0
//! auto_start=true
//! ```
//!
//! A line is only considered when its first character is a letter and it
//! contains `=`. Unknown keys are ignored.

use std::path::{Path, PathBuf};

use addin_api::AddinManifest;

use crate::error::AddinError;

/// Default manifest extension
pub const DEFAULT_MANIFEST_EXTENSION: &str = "ini";

/// Path of the manifest belonging to `binary`
pub fn sidecar_path(binary: &Path, extension: &str) -> PathBuf {
    binary.with_extension(extension)
}

/// Parses add-in manifests
#[derive(Debug, Clone, Default)]
pub struct ManifestReader {
    /// Truncate string values to this many characters
    max_value_chars: Option<usize>,
}

impl ManifestReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap string values, for hosts that show them in fixed-size widgets
    pub fn with_max_value_chars(mut self, max: Option<usize>) -> Self {
        self.max_value_chars = max;
        self
    }

    pub fn parse(&self, path: &Path) -> Result<AddinManifest, AddinError> {
        let mut manifest = AddinManifest::default();
        self.parse_into(&mut manifest, path)?;
        Ok(manifest)
    }

    /// Parse into an existing manifest. `manifest` is reset to defaults
    /// first, so it holds defaults when parsing fails.
    pub fn parse_into(&self, manifest: &mut AddinManifest, path: &Path) -> Result<(), AddinError> {
        *manifest = AddinManifest::default();

        if !path.is_file() {
            return Err(AddinError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| AddinError::ManifestParseFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        for (key, value) in content.lines().filter_map(split_key_line) {
            match key {
                "display_name" => manifest.display_name = self.string_value(value),
                "author" => manifest.author = self.string_value(value),
                "version" => manifest.version = self.string_value(value),
                "auto_start" => manifest.auto_start = parse_bool(value),
                _ => {}
            }
        }

        tracing::debug!(
            path = %path.display(),
            display_name = %manifest.display_name,
            author = %manifest.author,
            version = %manifest.version,
            auto_start = manifest.auto_start,
            "Parsed add-in manifest"
        );

        Ok(())
    }

    fn string_value(&self, value: &str) -> String {
        match self.max_value_chars {
            Some(max) => value.chars().take(max).collect(),
            None => value.to_string(),
        }
    }
}

/// Split a candidate `key=value` line into trimmed parts
fn split_key_line(line: &str) -> Option<(&str, &str)> {
    if !line.chars().next().is_some_and(char::is_alphabetic) {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    Some((key.trim_end(), value.trim()))
}

/// `true` when the lower-cased value starts with `1` or equals `true`
fn parse_bool(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    value.starts_with('1') || value == "true"
}
