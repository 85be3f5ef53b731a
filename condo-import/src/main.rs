//! condo-import - load units, people, expenses, revenue or budget lines
//! from a CSV file into the condo ledger database

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use condo_common::config::{ConfigOverrides, Settings};
use condo_common::db::init_database;
use condo_import::{import_file, ImportKind, ImportOptions};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for condo-import
#[derive(Parser, Debug)]
#[command(name = "condo-import")]
#[command(about = "Import a CSV file into the condo ledger database")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CONDO_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for the database and other data
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Database file (relative paths resolve against the root folder)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Validate and insert every row, then roll back
    #[arg(long)]
    dry_run: bool,

    /// Skip invalid rows instead of aborting the whole file
    #[arg(long)]
    skip_invalid: bool,

    /// Kind of records in the file
    #[arg(value_enum)]
    kind: ImportKind,

    /// CSV file with a header row
    csv_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only the JSON summary. The
    // subscriber is installed before settings resolve so their warnings show.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let rust_log_set = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("condo-import v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::resolve(&ConfigOverrides {
        config_file: args.config.clone(),
        root_folder: args.root_folder.clone(),
        database: args.database.clone(),
        ..Default::default()
    });
    if let (false, Ok(settings)) = (rust_log_set, &settings) {
        if let Err(e) = filter_handle.reload(EnvFilter::new(&settings.log_level)) {
            warn!("Failed to apply log level '{}': {}", settings.log_level, e);
        }
    }

    let settings = settings.context("Failed to resolve configuration")?;
    settings
        .ensure_root_folder()
        .context("Failed to create root folder")?;
    info!("Database path: {}", settings.database_path.display());
    let pool = init_database(&settings.database_path)
        .await
        .context("Failed to initialize database")?;

    let options = ImportOptions {
        dry_run: args.dry_run,
        skip_invalid: args.skip_invalid,
    };
    let summary = match import_file(&pool, args.kind, &args.csv_path, options).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Import failed: {}", e);
            return Err(e)
                .with_context(|| format!("Failed to import {}", args.csv_path.display()));
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    pool.close().await;
    Ok(())
}
