use std::path::PathBuf;

use addin_core::AddinHostConfig;
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Write the current configuration to disk
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: ConfigArgs, config: AddinHostConfig, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(AddinHostConfig::default_path);
    match args.command {
        ConfigCommands::Show => show_config(&config),
        ConfigCommands::Path => show_path(&path),
        ConfigCommands::Init { force } => init_config(&config, &path, force),
    }
}

fn show_config(config: &AddinHostConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{}", toml_str);
    Ok(())
}

fn show_path(path: &std::path::Path) -> Result<()> {
    println!("Config: {}", path.display());
    Ok(())
}

fn init_config(config: &AddinHostConfig, path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config.save(path)?;
    println!("Configuration written to {}", path.display());
    Ok(())
}
