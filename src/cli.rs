//! Command-line interface parsing for routecache
//!
//! This module handles parsing of CLI arguments using clap. Every option that
//! the scheduled job needs can also come from the environment, so a cron entry
//! or CI workflow only has to export the Strava credentials.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::config::{Credentials, SyncConfig, DEFAULT_INDEX_FILE, DEFAULT_MAX_PAGES};
use crate::data::strava::{STRAVA_API_BASE, STRAVA_TOKEN_URL};
use crate::data::RouteType;
use crate::viewer::RouteFilter;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// A required credential was not supplied
    #[error("Missing credential: set {0} or pass --{1}")]
    MissingCredential(&'static str, &'static str),

    /// The specified route type is not recognized
    #[error("Invalid route type: '{0}'. Valid types: ride, run, other")]
    InvalidRouteType(String),
}

/// routecache - Sync Strava routes into a GeoJSON cache for a static map viewer
#[derive(Parser, Debug)]
#[command(name = "routecache")]
#[command(about = "Sync Strava routes into a GeoJSON cache and manifest")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch routes from Strava and rebuild the cache and manifest
    Sync(SyncArgs),

    /// List cached routes from the manifest
    List(ListArgs),
}

/// Location of the cache on disk
#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    /// Directory where geometry files are written
    #[arg(long, env = "ROUTES_DIR", default_value = "routes")]
    pub routes_dir: PathBuf,

    /// Manifest path (defaults to <ROUTES_DIR>/index.json)
    #[arg(long = "index", env = "INDEX_PATH", value_name = "PATH")]
    pub index_path: Option<PathBuf>,
}

impl CacheArgs {
    /// Resolved manifest path
    pub fn index_path(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| self.routes_dir.join(DEFAULT_INDEX_FILE))
    }
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Strava application client id
    #[arg(long, env = "STRAVA_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Strava application client secret
    #[arg(long, env = "STRAVA_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Long-lived refresh token of the account to sync
    #[arg(long, env = "STRAVA_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    #[command(flatten)]
    pub cache: CacheArgs,

    /// Re-download every route even if unchanged upstream
    #[arg(long)]
    pub force: bool,

    /// Delete cached geometry files that are no longer in the manifest
    #[arg(long)]
    pub prune: bool,

    /// Maximum number of listing pages to fetch (at least 1)
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: u32,

    /// Strava API base URL
    #[arg(long, env = "STRAVA_API_BASE", default_value = STRAVA_API_BASE, hide = true)]
    pub api_base: String,

    /// Strava OAuth token URL
    #[arg(long, env = "STRAVA_TOKEN_URL", default_value = STRAVA_TOKEN_URL, hide = true)]
    pub token_url: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    /// Only show routes whose name contains this text
    #[arg(short, long)]
    pub search: Option<String>,

    /// Only show routes of this type (repeatable)
    ///
    /// Valid types: ride, run, other
    #[arg(short = 't', long = "type", value_name = "TYPE", value_parser = parse_route_type_arg)]
    pub types: Vec<RouteType>,

    /// Print matching manifest entries as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parses a route type string argument into a RouteType.
///
/// # Arguments
/// * `s` - The route type string from CLI
///
/// # Returns
/// * `Ok(RouteType)` if the string names a route type
/// * `Err(CliError::InvalidRouteType)` otherwise
pub fn parse_route_type_arg(s: &str) -> Result<RouteType, CliError> {
    RouteType::parse(s).ok_or_else(|| CliError::InvalidRouteType(s.to_string()))
}

/// Returns the value if present and not blank
fn required(
    value: &Option<String>,
    env: &'static str,
    flag: &'static str,
) -> Result<String, CliError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(CliError::MissingCredential(env, flag))
}

impl SyncConfig {
    /// Creates a SyncConfig from parsed `sync` arguments.
    ///
    /// # Returns
    /// * `Ok(SyncConfig)` with credentials and paths resolved
    /// * `Err(CliError)` if any credential is missing
    pub fn from_args(args: &SyncArgs) -> Result<Self, CliError> {
        let credentials = Credentials {
            client_id: required(&args.client_id, "STRAVA_CLIENT_ID", "client-id")?,
            client_secret: required(&args.client_secret, "STRAVA_CLIENT_SECRET", "client-secret")?,
            refresh_token: required(&args.refresh_token, "STRAVA_REFRESH_TOKEN", "refresh-token")?,
        };

        Ok(SyncConfig {
            credentials,
            routes_dir: args.cache.routes_dir.clone(),
            index_path: args.cache.index_path(),
            api_base: args.api_base.clone(),
            token_url: args.token_url.clone(),
            max_pages: args.max_pages,
            force: args.force,
            prune: args.prune,
        })
    }
}

impl ListArgs {
    /// Builds the route filter described by the arguments
    pub fn filter(&self) -> RouteFilter {
        RouteFilter::new(self.search.clone(), self.types.clone())
    }
}
