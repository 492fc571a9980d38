//! Manifest inspection

use std::path::{Path, PathBuf};

use addin_core::AddinHostConfig;
use addin_core::manifest::{ManifestReader, sidecar_path};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct InspectArgs {
    /// Manifest file, or an add-in library whose sidecar manifest to read
    pub path: PathBuf,
}

pub fn run(args: InspectArgs, config: &AddinHostConfig) -> Result<()> {
    let manifest_path = manifest_path(&args.path, &config.manifest_extension);
    let manifest = ManifestReader::new()
        .with_max_value_chars(config.max_manifest_value_chars)
        .parse(&manifest_path)?;

    println!("Manifest:     {}", manifest_path.display());
    println!("Name:         {}", or_unknown(&manifest.display_name));
    println!("Author:       {}", or_unknown(&manifest.author));
    println!("Version:      {}", or_unknown(&manifest.version));
    println!("Auto start:   {}", if manifest.auto_start { "yes" } else { "no" });
    Ok(())
}

/// `path` itself when it already is a manifest, its sidecar otherwise
fn manifest_path(path: &Path, extension: &str) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == extension) {
        path.to_path_buf()
    } else {
        sidecar_path(path, extension)
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { "Unknown" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_path_keeps_manifest() {
        assert_eq!(
            manifest_path(Path::new("/addins/tracer.ini"), "ini"),
            PathBuf::from("/addins/tracer.ini")
        );
    }

    #[test]
    fn test_manifest_path_uses_sidecar_for_library() {
        assert_eq!(
            manifest_path(Path::new("/addins/tracer.dll"), "ini"),
            PathBuf::from("/addins/tracer.ini")
        );
    }

    #[test]
    fn test_or_unknown() {
        assert_eq!(or_unknown(""), "Unknown");
        assert_eq!(or_unknown("gb"), "gb");
    }
}
