//! Core data models for routecache
//!
//! This module contains the route types shared by the Strava client, the
//! geometry materializer and the cache, plus the submodules that produce them.

pub mod geometry;
pub mod polyline;
pub mod strava;

pub use geometry::{materialize, GeometryError, RouteGeometry};
pub use self::polyline::PolylineError;
pub use strava::{AccessToken, Athlete, RouteApi, RouteListing, StravaClient, StravaError};

use chrono::{DateTime, Utc};
use geo::{BoundingRect, LineString};
use serde::{Deserialize, Deserializer, Serialize};

/// Activity type of a route
///
/// Strava reports route types as integers (`1` for rides, `2` for runs), while
/// the manifest stores them as lowercase strings. Both forms deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Ride,
    Run,
    Other,
}

impl RouteType {
    /// Parses a route type from a string, accepting the names and the numeric codes
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ride" | "1" => Some(RouteType::Ride),
            "run" | "2" => Some(RouteType::Run),
            "other" => Some(RouteType::Other),
            _ => None,
        }
    }

    /// Maps a Strava numeric route type to a RouteType
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => RouteType::Ride,
            2 => RouteType::Run,
            _ => RouteType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Ride => "ride",
            RouteType::Run => "run",
            RouteType::Other => "other",
        }
    }
}

impl std::fmt::Display for RouteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RouteType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(i64),
            Name(String),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Code(code)) => RouteType::from_code(code),
            Some(Raw::Name(name)) => RouteType::parse(&name).unwrap_or(RouteType::Other),
            None => RouteType::Other,
        })
    }
}

/// Summary of one route as returned by the route listing endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    /// Remote route identifier
    pub id: u64,
    /// Human-readable route name
    pub name: String,
    /// Activity type of the route
    pub route_type: RouteType,
    /// Route length in meters
    pub distance_m: f64,
    /// Total elevation gain in meters, if reported
    pub elev_gain_m: Option<f64>,
    /// When the route was last modified upstream
    pub updated_at: Option<DateTime<Utc>>,
    /// Low-resolution polyline included in the listing, if any
    pub summary_polyline: Option<String>,
}

impl RouteSummary {
    /// Route length in kilometers, rounded to meter precision
    pub fn distance_km(&self) -> f64 {
        self.distance_m.round() / 1000.0
    }
}

/// Geographic bounding box of a route in degrees
///
/// Serialized as `[south, west, north, east]`, the order the manifest uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Computes the bounding box of a line in `(longitude, latitude)` order
    ///
    /// Returns `None` for an empty line.
    pub fn from_line(line: &LineString<f64>) -> Option<Self> {
        let rect = line.bounding_rect()?;
        Some(BoundingBox {
            south: rect.min().y,
            west: rect.min().x,
            north: rect.max().y,
            east: rect.max().x,
        })
    }

    /// Center point as `[longitude, latitude]`
    pub fn center(&self) -> [f64; 2] {
        [(self.west + self.east) / 2.0, (self.south + self.north) / 2.0]
    }

    /// RFC 7946 ordering: `[west, south, east, north]`
    pub fn to_geojson(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([south, west, north, east]: [f64; 4]) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.south, b.west, b.north, b.east]
    }
}
