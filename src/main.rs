//! routecache - Strava route cache builder
//!
//! Runs the `sync` batch job that refreshes the GeoJSON cache and manifest,
//! or lists what the manifest currently holds.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use routecache::cache::CacheManager;
use routecache::cli::{Cli, Command, ListArgs, SyncArgs};
use routecache::config::SyncConfig;
use routecache::data::StravaClient;
use routecache::sync::run_sync;
use routecache::viewer::render_list;

/// Initializes the tracing subscriber from the verbosity flags
///
/// Without flags, `RUST_LOG` is honoured and defaults to `info`.
fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the sync pipeline against the real Strava API
async fn sync(args: &SyncArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = SyncConfig::from_args(args)?;
    let client = StravaClient::with_endpoints(&config.api_base, &config.token_url)?;

    let report = run_sync(&client, &config).await?;
    info!(
        fetched = report.fetched,
        published = report.published(),
        skipped = report.skipped,
        "Sync complete"
    );
    println!("{}", report);

    Ok(())
}

/// Prints the routes in the manifest that match the filter
fn list(args: &ListArgs) -> Result<(), Box<dyn std::error::Error>> {
    let cache = CacheManager::new(&args.cache.routes_dir, args.cache.index_path());
    let manifest = cache.load_manifest()?;
    let routes = args.filter().apply(&manifest);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&routes)?);
    } else {
        print!("{}", render_list(&routes));
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Command::Sync(args) => sync(args).await,
        Command::List(args) => list(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
