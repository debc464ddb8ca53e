//! Route manifest consumed by the map viewer
//!
//! The manifest is rebuilt from scratch on every sync run. It lists every
//! cached route with the fields the viewer needs for its list, plus the
//! relative path of the route's geometry file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{BoundingBox, RouteSummary, RouteType};

/// One route entry in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRoute {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub route_type: RouteType,
    pub distance_m: f64,
    pub distance_km: f64,
    pub elev_gain_m: Option<f64>,
    /// `[south, west, north, east]`
    pub bbox: BoundingBox,
    /// `[longitude, latitude]` of the bounding box center
    pub center: [f64; 2],
    /// Path of the geometry file relative to the site root
    pub file: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ManifestRoute {
    /// Builds a manifest entry from a route summary and its cached file
    pub fn new(summary: &RouteSummary, slug: &str, bbox: BoundingBox, file: String) -> Self {
        Self {
            id: summary.id,
            name: summary.name.clone(),
            slug: slug.to_string(),
            route_type: summary.route_type,
            distance_m: summary.distance_m,
            distance_km: summary.distance_km(),
            elev_gain_m: summary.elev_gain_m,
            bbox,
            center: bbox.center(),
            file,
            updated_at: summary.updated_at,
        }
    }
}

/// The aggregate index of cached routes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub athlete_id: Option<u64>,
    #[serde(default)]
    pub count: usize,
    pub routes: Vec<ManifestRoute>,
}

impl Manifest {
    /// Looks up a route entry by its remote identifier
    pub fn find(&self, id: u64) -> Option<&ManifestRoute> {
        self.routes.iter().find(|route| route.id == id)
    }
}

/// Accumulates manifest entries during a sync run
#[derive(Debug, Default)]
pub struct IndexBuilder {
    athlete_id: Option<u64>,
    routes: Vec<ManifestRoute>,
}

impl IndexBuilder {
    pub fn new(athlete_id: Option<u64>) -> Self {
        Self {
            athlete_id,
            routes: Vec::new(),
        }
    }

    pub fn push(&mut self, route: ManifestRoute) {
        self.routes.push(route);
    }

    /// Finishes the manifest, ordering routes by type and then name
    ///
    /// Ties are broken by id so the order is stable across runs.
    pub fn build(mut self, generated_at: DateTime<Utc>) -> Manifest {
        self.routes.sort_by(|a, b| {
            a.route_type
                .as_str()
                .cmp(b.route_type.as_str())
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });

        Manifest {
            generated_at,
            athlete_id: self.athlete_id,
            count: self.routes.len(),
            routes: self.routes,
        }
    }
}
