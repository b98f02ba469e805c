//! liveconf CLI
//!
//! Reads values from a configuration file through the same store a service
//! would embed: defaults layering, region scoping and environment overrides.

use anyhow::Result;
use clap::Parser;
use liveconf::ConfigStore;
use liveconf::cli::{Cli, Command, LookupArgs};
use liveconf::config::WatcherConfig;
use liveconf::format::{OutputFormat, render};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn lookup(store: &ConfigStore, args: &LookupArgs, by_region: bool) -> Result<()> {
    let value = if by_region {
        store.get_by_region_with(&args.path, args.default_value(), None)?
    } else {
        store.get_with(&args.path, args.default_value(), None)?
    };
    println!("{}", render(&value, args.format.into())?);
    Ok(())
}

async fn watch(store: Arc<ConfigStore>, format: OutputFormat) -> Result<()> {
    let mut generations = store.subscribe();
    println!("{}", render(store.snapshot().root(), format)?);

    loop {
        tokio::select! {
            changed = generations.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = store.snapshot();
                info!(
                    generation = snapshot.generation(),
                    loaded_at = %snapshot.loaded_at().to_rfc3339(),
                    "Configuration reloaded"
                );
                println!("{}", render(snapshot.root(), format)?);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut builder = ConfigStore::builder(cli.file.as_str())
        .separator(cli.separator.as_str())
        .placeholder_var(cli.placeholder_var.as_str());
    if let Some(ref region) = cli.region {
        builder = builder.region(region.as_str());
    }
    builder = match cli.command {
        Command::Watch(_) => builder.watch(WatcherConfig::default()),
        _ => builder.no_watch(),
    };
    let store = builder.build()?;

    match cli.command {
        Command::Get(ref args) => lookup(&store, args, false),
        Command::RegionGet(ref args) => lookup(&store, args, true),
        Command::Dump(ref args) => {
            println!("{}", render(store.snapshot().root(), args.format.into())?);
            Ok(())
        }
        Command::Watch(ref args) => watch(store, args.format.into()).await,
    }
}
