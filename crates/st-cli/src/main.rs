use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use st_cli::commands::{cleanup, digest, export, migrate, report, reset, run, status};
use st_cli::{Cli, Commands, Config};
use st_db::UsageStore;

/// Opens the store, ensuring the parent directory exists.
fn open_store(config: &Config) -> Result<UsageStore> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    UsageStore::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: tests may have installed a subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = std::io::stdout().lock();
    let now = Utc::now();

    match &cli.command {
        Some(Commands::Run) => {
            let store = open_store(&config)?;
            run::run(&mut stdout, store, &config)?;
        }
        Some(Commands::Status) => {
            let mut store = open_store(&config)?;
            status::run(&mut stdout, &mut store, &config)?;
        }
        Some(Commands::Report { json, limit }) => {
            let mut store = open_store(&config)?;
            report::run(&mut stdout, &mut store, *json, *limit, now)?;
        }
        Some(Commands::Cleanup { days }) => {
            let mut store = open_store(&config)?;
            let days = days.unwrap_or(config.tracking.retention_days);
            cleanup::run(&mut stdout, &mut store, days, now)?;
        }
        Some(Commands::Reset { keep, yes }) => {
            let mut store = open_store(&config)?;
            reset::run(&mut stdout, &mut store, keep, *yes)?;
        }
        Some(Commands::Export { output }) => {
            let store = open_store(&config)?;
            export::run(&mut stdout, &store, output.as_deref(), now)?;
        }
        Some(Commands::Migrate) => {
            let mut store = open_store(&config)?;
            migrate::run(&mut stdout, &mut store, now)?;
        }
        Some(Commands::Digest) => {
            let mut store = open_store(&config)?;
            digest::run(&mut stdout, &mut store, &config)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
