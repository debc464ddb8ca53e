//! Route synchronization pipeline
//!
//! Runs one batch sync: refresh the access token, list every route, bring the
//! geometry cache up to date, and publish a fresh manifest. Steps run strictly
//! one after another.
//!
//! Failures fall into two groups. Auth, listing and filesystem errors abort
//! the run before the manifest is written, so the previously published one
//! stays in place. A route whose geometry cannot be obtained or decoded is
//! logged and left out of the new manifest.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{
    geometry_file_name, slugify, CacheError, CacheManager, IndexBuilder, ManifestRoute,
};
use crate::config::SyncConfig;
use crate::data::strava::ROUTES_PER_PAGE;
use crate::data::{materialize, AccessToken, RouteApi, RouteSummary, StravaError};

/// Errors that abort a sync run
#[derive(Debug, Error)]
pub enum SyncError {
    /// The access token could not be obtained
    #[error("Authentication failed: {0}")]
    Auth(#[source] StravaError),

    /// The athlete or the route listing could not be fetched
    #[error("Failed to fetch routes: {0}")]
    Network(#[source] StravaError),

    /// The cache directory or manifest could not be written
    #[error("Cache write failed: {0}")]
    Filesystem(#[from] CacheError),
}

/// Counts reported at the end of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Routes returned by the listing
    pub fetched: usize,
    /// Routes whose geometry was downloaded and written
    pub written: usize,
    /// Routes reused from the cache because they were unchanged upstream
    pub unchanged: usize,
    /// Routes left out of the manifest because their geometry was unusable
    pub skipped: usize,
    /// Cached geometry files no longer referenced by the manifest
    pub orphaned: usize,
    /// Orphaned files that were deleted
    pub pruned: usize,
    /// The listing stopped at the page limit; pruning is skipped
    pub truncated: bool,
    /// Routes missing from a truncated listing that were kept from the previous manifest
    pub carried_over: usize,
}

impl SyncReport {
    /// Number of routes listed in the new manifest
    pub fn published(&self) -> usize {
        self.written + self.unchanged + self.carried_over
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} routes fetched: {} written, {} unchanged, {} skipped",
            self.fetched, self.written, self.unchanged, self.skipped
        )?;
        if self.pruned > 0 {
            write!(f, ", {} pruned", self.pruned)?;
        } else if self.orphaned > 0 {
            write!(f, ", {} orphaned", self.orphaned)?;
        }
        if self.truncated {
            write!(
                f,
                " (listing truncated at the page limit, {} kept from previous manifest)",
                self.carried_over
            )?;
        }
        Ok(())
    }
}

/// Result of processing a single route
enum RouteOutcome {
    Written(ManifestRoute),
    Unchanged(ManifestRoute),
    Skipped,
}

/// Runs a full sync against `api` using `config`
///
/// # Arguments
/// * `api` - Source of routes, usually a [`crate::data::StravaClient`]
/// * `config` - Credentials, paths and flags for this run
///
/// # Returns
/// * `Ok(SyncReport)` once the new manifest has been written
/// * `Err(SyncError)` if the run was aborted; the previous manifest is untouched
pub async fn run_sync<A: RouteApi>(api: &A, config: &SyncConfig) -> Result<SyncReport, SyncError> {
    let token = api
        .refresh_access_token(&config.credentials)
        .await
        .map_err(SyncError::Auth)?;

    let athlete = api.current_athlete(&token).await.map_err(SyncError::Network)?;
    let listing = api
        .list_routes(&token, athlete.id, ROUTES_PER_PAGE, config.max_pages)
        .await
        .map_err(SyncError::Network)?;

    // Pages can shift between requests, repeating a route on two pages
    let mut seen = HashSet::new();
    let mut routes = listing.routes;
    routes.retain(|route| {
        let first = seen.insert(route.id);
        if !first {
            debug!(route_id = route.id, "Skipping duplicate route in listing");
        }
        first
    });
    info!(athlete_id = athlete.id, count = routes.len(), "Found routes");

    let cache = CacheManager::new(&config.routes_dir, &config.index_path);
    cache.ensure_dir()?;

    let previous: HashMap<u64, ManifestRoute> = cache
        .read_manifest()
        .map(|manifest| manifest.routes.into_iter().map(|r| (r.id, r)).collect())
        .unwrap_or_default();

    let mut report = SyncReport {
        fetched: routes.len(),
        truncated: listing.truncated,
        ..SyncReport::default()
    };
    let mut builder = IndexBuilder::new(Some(athlete.id));
    let mut referenced = HashSet::new();

    for summary in &routes {
        let slug = slugify(&summary.name);
        let file_name = geometry_file_name(summary.id, &slug);

        let cached = if config.force {
            None
        } else {
            previous.get(&summary.id)
        };

        match sync_route(api, &token, &cache, summary, &slug, &file_name, cached).await? {
            RouteOutcome::Written(entry) => {
                report.written += 1;
                referenced.insert(file_name);
                builder.push(entry);
            }
            RouteOutcome::Unchanged(entry) => {
                report.unchanged += 1;
                referenced.insert(file_name);
                builder.push(entry);
            }
            RouteOutcome::Skipped => report.skipped += 1,
        }
    }

    // Routes past the page limit are still published from the previous run
    if listing.truncated {
        for entry in previous.into_values().filter(|e| !seen.contains(&e.id)) {
            let file_name = entry.file.rsplit('/').next().unwrap_or_default().to_string();
            if cache.contains(&file_name) {
                report.carried_over += 1;
                referenced.insert(file_name);
                builder.push(entry);
            }
        }
        if report.carried_over > 0 {
            info!(
                count = report.carried_over,
                "Kept routes from the previous manifest that the truncated listing did not reach"
            );
        }
    }

    let manifest = builder.build(Utc::now());
    cache.write_manifest(&manifest)?;
    info!(
        count = manifest.count,
        index = %cache.index_path().display(),
        "Wrote manifest"
    );

    if config.prune && listing.truncated {
        report.orphaned = cache.orphans(&referenced)?.len();
        warn!(
            count = report.orphaned,
            "Route listing was truncated; not pruning cached geometry files"
        );
    } else if config.prune {
        report.pruned = cache.prune_orphans(&referenced)?.len();
        report.orphaned = report.pruned;
    } else {
        let orphans = cache.orphans(&referenced)?;
        report.orphaned = orphans.len();
        if !orphans.is_empty() {
            info!(
                count = orphans.len(),
                "Cached geometry files are no longer referenced; run with --prune to remove them"
            );
        }
    }

    Ok(report)
}

/// Brings one route's geometry file up to date
async fn sync_route<A: RouteApi>(
    api: &A,
    token: &AccessToken,
    cache: &CacheManager,
    summary: &RouteSummary,
    slug: &str,
    file_name: &str,
    previous: Option<&ManifestRoute>,
) -> Result<RouteOutcome, SyncError> {
    let site_path = cache.site_path(file_name);

    if let Some(prev) = previous {
        let unchanged = summary.updated_at.is_some()
            && prev.updated_at == summary.updated_at
            && prev.file == site_path
            && cache.contains(file_name);
        if unchanged {
            debug!(route_id = summary.id, "Route unchanged, reusing cached geometry");
            return Ok(RouteOutcome::Unchanged(ManifestRoute::new(
                summary, slug, prev.bbox, site_path,
            )));
        }
    }

    let encoded = match api.route_polyline(token, summary.id).await {
        Ok(Some(polyline)) => Some(polyline),
        Ok(None) => summary.summary_polyline.clone(),
        Err(e) => {
            warn!(route_id = summary.id, "Could not fetch route detail: {}", e);
            summary.summary_polyline.clone()
        }
    };

    let Some(encoded) = encoded else {
        warn!(route_id = summary.id, name = %summary.name, "Skipping route without polyline");
        return Ok(RouteOutcome::Skipped);
    };

    let geometry = match materialize(summary, slug, &encoded) {
        Ok(geometry) => geometry,
        Err(e) => {
            warn!(route_id = summary.id, name = %summary.name, "Skipping route: {}", e);
            return Ok(RouteOutcome::Skipped);
        }
    };

    cache.write_geometry(file_name, &geometry)?;
    Ok(RouteOutcome::Written(ManifestRoute::new(
        summary,
        slug,
        geometry.bounding_box(),
        site_path,
    )))
}
