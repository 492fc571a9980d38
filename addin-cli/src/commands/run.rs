//! Run add-ins against synthetic host events

use std::path::PathBuf;
use std::time::Duration;

use addin_api::{EventKind, StartArgs};
use addin_core::{AddinEvent, AddinHostConfig, AddinRegistry, DispatchMode};
use anyhow::Result;
use clap::Args;
use tracing::debug;

#[derive(Args)]
pub struct RunArgs {
    /// Directory to import add-ins from (defaults to the configured add-in directory)
    pub dir: Option<PathBuf>,

    /// Event to dispatch, as `kind` or `kind=value` (e.g. `pause=true`, `rgb-encode=1,2,3`)
    #[arg(short, long = "event", value_parser = parse_event)]
    pub events: Vec<AddinEvent>,

    /// Start every add-in, not only those with `auto_start` set
    #[arg(long)]
    pub all: bool,

    /// How to run add-in code (overrides the config)
    #[arg(long, value_parser = parse_dispatch)]
    pub dispatch: Option<DispatchMode>,

    /// Time to let detached add-in code run before unloading, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub wait_ms: u64,
}

pub async fn run(args: RunArgs, mut config: AddinHostConfig) -> Result<()> {
    if let Some(dispatch) = args.dispatch {
        config.dispatch = dispatch;
    }
    let dir = args.dir.unwrap_or_else(|| config.addin_dir.clone());
    let registry = AddinRegistry::new(&config);

    let results = registry.import_dir(&dir)?;
    let imported = results.iter().filter(|(_, result)| result.is_ok()).count();
    for (path, result) in &results {
        if let Err(e) = result {
            tracing::warn!("Skipping add-in {}: {}", path.display(), e);
        }
    }
    println!("Imported {} of {} add-ins from {}", imported, results.len(), dir.display());

    let started = if args.all {
        registry
            .list()
            .iter()
            .filter(|addin| registry.start(addin.id, StartArgs::MANUAL))
            .count()
    } else {
        registry.start_auto_addins()
    };
    println!("Started {} add-ins", started);

    // Give start() a chance to subscribe before the first event
    settle(args.wait_ms).await;

    for event in &args.events {
        debug!("Dispatching {:?}", event);
        let handlers = registry.dispatch(event);
        println!("{} -> {} handlers", event.kind(), handlers);
    }

    settle(args.wait_ms).await;
    registry.unload_all();
    settle(args.wait_ms).await;
    Ok(())
}

async fn settle(wait_ms: u64) {
    if wait_ms > 0 {
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
    }
}

/// Parse `kind[=value]` into an event
fn parse_event(s: &str) -> Result<AddinEvent, String> {
    let (kind, value) = match s.split_once('=') {
        Some((kind, value)) => (kind, Some(value)),
        None => (s, None),
    };
    let kind: EventKind = kind.parse()?;
    AddinEvent::parse(kind, value)
}

fn parse_dispatch(s: &str) -> Result<DispatchMode, String> {
    match s {
        "inline" => Ok(DispatchMode::Inline),
        "thread" => Ok(DispatchMode::Thread),
        "blocking" => Ok(DispatchMode::Blocking),
        other => Err(format!("unknown dispatch mode '{other}' (inline, thread, blocking)")),
    }
}
