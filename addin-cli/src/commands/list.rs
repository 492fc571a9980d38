//! Add-in discovery

use std::path::PathBuf;

use addin_core::{AddinHostConfig, AddinInfo, AddinRegistry};
use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tracing::debug;

#[derive(Args)]
pub struct ListArgs {
    /// Directory to scan (defaults to the configured add-in directory)
    pub dir: Option<PathBuf>,
}

pub fn run(args: ListArgs, config: AddinHostConfig) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| config.addin_dir.clone());
    let registry = AddinRegistry::new(&config);
    debug!("Scanning {} for add-ins", dir.display());

    let results = registry.import_dir(&dir)?;
    if results.is_empty() {
        println!("No add-ins found in {}", dir.display());
        println!();
        println!("An add-in is a dynamic library with a manifest next to it:");
        println!("  {}/tracer.so", dir.display());
        println!("  {}/tracer.{}", dir.display(), config.manifest_extension);
        return Ok(());
    }

    let addins = registry.list();
    if !addins.is_empty() {
        println!("{}", table(&addins));
    }

    for (path, result) in &results {
        if let Err(e) = result {
            tracing::warn!("Error importing add-in {}: {}", path.display(), e);
            println!("✗ {}: {}", path.display(), e);
        }
    }

    registry.unload_all();
    Ok(())
}

fn table(addins: &[AddinInfo]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::Cyan),
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Author").fg(Color::Cyan),
        Cell::new("Version").fg(Color::Cyan),
        Cell::new("Auto start").fg(Color::Cyan),
        Cell::new("Library").fg(Color::Cyan),
    ]);

    for addin in addins {
        let file = addin
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(addin.id),
            Cell::new(&addin.manifest.display_name),
            Cell::new(&addin.manifest.author),
            Cell::new(&addin.manifest.version),
            Cell::new(if addin.manifest.auto_start { "yes" } else { "no" }),
            Cell::new(file),
        ]);
    }
    table
}
