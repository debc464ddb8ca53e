//! Runtime configuration for a sync run
//!
//! Everything a run needs is collected into a [`SyncConfig`] once at startup
//! and passed by reference to the components that need it.

use std::fmt;
use std::path::PathBuf;

use crate::data::strava::{STRAVA_API_BASE, STRAVA_TOKEN_URL};

/// Default directory for cached geometry files
pub const DEFAULT_ROUTES_DIR: &str = "routes";

/// Name of the manifest file inside the routes directory
pub const DEFAULT_INDEX_FILE: &str = "index.json";

/// Default cap on the number of listing pages fetched per run
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Strava application credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

/// Configuration for one sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Strava application credentials
    pub credentials: Credentials,
    /// Directory where geometry files are written
    pub routes_dir: PathBuf,
    /// Path of the manifest file
    pub index_path: PathBuf,
    /// Base URL of the Strava REST API
    pub api_base: String,
    /// OAuth token endpoint
    pub token_url: String,
    /// Maximum number of listing pages to fetch
    pub max_pages: u32,
    /// Re-download every route even when unchanged upstream
    pub force: bool,
    /// Delete cached geometry files the new manifest no longer references
    pub prune: bool,
}

impl SyncConfig {
    /// Creates a config with default paths and endpoints
    pub fn new(credentials: Credentials) -> Self {
        let routes_dir = PathBuf::from(DEFAULT_ROUTES_DIR);
        Self {
            credentials,
            index_path: routes_dir.join(DEFAULT_INDEX_FILE),
            routes_dir,
            api_base: STRAVA_API_BASE.to_string(),
            token_url: STRAVA_TOKEN_URL.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            force: false,
            prune: false,
        }
    }

    /// Points the run at a different routes directory
    ///
    /// The manifest follows the directory unless set separately afterwards.
    pub fn with_routes_dir(mut self, routes_dir: impl Into<PathBuf>) -> Self {
        self.routes_dir = routes_dir.into();
        self.index_path = self.routes_dir.join(DEFAULT_INDEX_FILE);
        self
    }
}
