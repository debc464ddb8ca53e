//! GeoJSON materialization of route geometry
//!
//! Turns an encoded polyline plus its route summary into a GeoJSON
//! `FeatureCollection` holding a single `LineString` feature.

use chrono::SecondsFormat;
use geo::LineString;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::polyline::{self, PolylineError};
use super::{BoundingBox, RouteSummary};

/// Errors that can occur when materializing a route's geometry
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The encoded polyline was malformed
    #[error("Failed to decode polyline: {0}")]
    Decode(#[from] PolylineError),

    /// The polyline decoded to no points at all
    #[error("Polyline decoded to zero coordinates")]
    Empty,
}

/// GeoJSON document written for each cached route
///
/// Serializes as the bare `FeatureCollection`, whose `bbox` is in RFC 7946
/// order (`[west, south, east, north]`).
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    collection: FeatureCollection,
    bbox: BoundingBox,
}

impl RouteGeometry {
    /// Bounding box of the route in manifest orientation
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    pub fn collection(&self) -> &FeatureCollection {
        &self.collection
    }
}

impl Serialize for RouteGeometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.collection.serialize(serializer)
    }
}

/// Feature properties carried alongside the line
fn route_properties(summary: &RouteSummary, slug: &str) -> JsonObject {
    let mut properties = JsonObject::new();
    properties.insert("id".to_string(), summary.id.into());
    properties.insert("name".to_string(), summary.name.clone().into());
    properties.insert("slug".to_string(), slug.into());
    properties.insert("type".to_string(), summary.route_type.as_str().into());
    properties.insert("distance_m".to_string(), summary.distance_m.into());
    properties.insert("distance_km".to_string(), summary.distance_km().into());
    properties.insert("elev_gain_m".to_string(), summary.elev_gain_m.into());
    properties.insert(
        "updated_at".to_string(),
        summary
            .updated_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .into(),
    );
    properties
}

/// Decodes `encoded` and wraps it with the route's properties.
///
/// # Arguments
/// * `summary` - The route the polyline belongs to
/// * `slug` - Filesystem-safe form of the route name
/// * `encoded` - Strava encoded polyline
///
/// # Returns
/// * `Ok(RouteGeometry)` with one `LineString` feature and its bounding box
/// * `Err(GeometryError)` if the polyline is malformed or empty
pub fn materialize(
    summary: &RouteSummary,
    slug: &str,
    encoded: &str,
) -> Result<RouteGeometry, GeometryError> {
    let line: LineString<f64> = polyline::decode(encoded)?;
    let bbox = BoundingBox::from_line(&line).ok_or(GeometryError::Empty)?;

    let coordinates = line.coords().map(|c| vec![c.x, c.y]).collect();
    let feature = Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coordinates))),
        id: None,
        properties: Some(route_properties(summary, slug)),
        foreign_members: None,
    };

    Ok(RouteGeometry {
        collection: FeatureCollection {
            bbox: Some(bbox.to_geojson().to_vec()),
            features: vec![feature],
            foreign_members: None,
        },
        bbox,
    })
}
