use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "addins", about = "Inspect and exercise emulator add-ins")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.config/addins/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the contents of an add-in manifest
    Inspect(commands::inspect::InspectArgs),
    /// Import the add-ins in a directory and list them
    List(commands::list::ListArgs),
    /// Import and start add-ins, then fire events at them
    Run(commands::run::RunArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect(args) => commands::inspect::run(args, &config),
        Commands::List(args) => commands::list::run(args, config),
        Commands::Run(args) => commands::run::run(args, config).await,
        Commands::Config(args) => commands::config::run(args, config, cli.config),
    }
}
