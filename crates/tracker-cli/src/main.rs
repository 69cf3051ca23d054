//! Asset Tracker CLI
//!
//! Command-line interface for inspecting and deprecating asset tracker
//! records. Results are printed as JSON.

use asset_tracker_api::tracker::DEPRECATED_MESSAGE;
use asset_tracker_api::{AppState, TrackFilter};
use asset_tracker_core::TrackingKey;
use asset_tracker_storage::{parse_storage_uri, storage_from_uri, StorageLocation};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "asset-tracker")]
#[command(version, about = "Asset tracker CLI", long_about = None)]
struct Cli {
    /// Storage location (`file://<path>`, `sqlite::memory:` or a plain path)
    #[arg(
        short,
        long,
        env = "ASSET_TRACKER_DB",
        default_value = "asset_tracker.db",
        global = true
    )]
    database: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the asset tracker tables
    Init {
        /// Remove an existing database file first
        #[arg(short, long)]
        force: bool,
    },

    /// List tracking records
    List {
        /// Filter by asset name
        #[arg(short, long)]
        asset: Option<String>,

        /// Filter by event name
        #[arg(short, long)]
        event: Option<String>,

        /// Filter by service name
        #[arg(short, long)]
        service: Option<String>,
    },

    /// Mark a tracking record deprecated
    Deprecate {
        service: String,
        asset: String,
        event: String,
    },

    /// Show per-asset datapoint usage from store events
    Usage,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { force } => init_database(&cli.database, force),
        Commands::List {
            asset,
            event,
            service,
        } => {
            let filter = TrackFilter {
                asset,
                event,
                service,
            };
            list_records(&cli.database, &filter)
                .await
                .and_then(|out| print_json(&out))
        }
        Commands::Deprecate {
            service,
            asset,
            event,
        } => deprecate(&cli.database, TrackingKey::new(service, asset, event))
            .await
            .and_then(|out| print_json(&out)),
        Commands::Usage => datapoint_usage(&cli.database)
            .await
            .and_then(|out| print_json(&out)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn open_state(uri: &str) -> CliResult<AppState> {
    let storage = storage_from_uri(uri)?;
    Ok(AppState::from_storage(Arc::new(storage)))
}

fn print_json(value: &Value) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_database(uri: &str, force: bool) -> CliResult {
    if let StorageLocation::Local(path) = parse_storage_uri(uri)? {
        if path.exists() {
            if !force {
                return Err(format!(
                    "Database already exists at '{}'. Use --force to overwrite.",
                    path.display()
                )
                .into());
            }
            eprintln!("Removing existing database at '{}'", path.display());
            std::fs::remove_file(&path)?;
        }
    }

    storage_from_uri(uri)?;
    println!("Initialized asset tracker at '{}'", uri);
    Ok(())
}

async fn list_records(uri: &str, filter: &TrackFilter) -> CliResult<Value> {
    let state = open_state(uri)?;
    let track = state.tracker.list_records(filter).await?;
    Ok(json!({ "track": track }))
}

async fn deprecate(uri: &str, key: TrackingKey) -> CliResult<Value> {
    let state = open_state(uri)?;
    state.tracker.deprecate(&key).await?;
    Ok(json!({ "success": DEPRECATED_MESSAGE }))
}

async fn datapoint_usage(uri: &str) -> CliResult<Value> {
    let state = open_state(uri)?;
    let usage = state.tracker.datapoint_usage().await?;
    Ok(serde_json::to_value(usage)?)
}
