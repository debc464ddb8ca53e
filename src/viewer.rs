//! Manifest listing and filtering
//!
//! Applies the same filters as the static map viewer (a free-text match on
//! the route name plus a set of activity types) so the cache can be inspected
//! from the terminal. Only the manifest is read; geometry files are never
//! opened.

use crate::cache::{Manifest, ManifestRoute};
use crate::data::RouteType;

/// Filter over manifest routes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteFilter {
    /// Case-insensitive substring that must appear in the route name
    pub query: Option<String>,
    /// Allowed route types; empty means every type
    pub types: Vec<RouteType>,
}

impl RouteFilter {
    pub fn new(query: Option<String>, types: Vec<RouteType>) -> Self {
        let query = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        Self { query, types }
    }

    /// Whether a single route passes the filter
    pub fn matches(&self, route: &ManifestRoute) -> bool {
        let type_ok = self.types.is_empty() || self.types.contains(&route.route_type);
        let name_ok = match &self.query {
            Some(query) => route.name.to_lowercase().contains(query.as_str()),
            None => true,
        };
        type_ok && name_ok
    }

    /// Routes of `manifest` that pass the filter, in manifest order
    pub fn apply<'a>(&self, manifest: &'a Manifest) -> Vec<&'a ManifestRoute> {
        manifest.routes.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Renders routes as a plain-text table followed by a count line
pub fn render_list(routes: &[&ManifestRoute]) -> String {
    let name_width = routes
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = String::new();
    if !routes.is_empty() {
        out.push_str(&format!(
            "{:<12} {:<5} {:<name_width$} {:>10} {:>8}\n",
            "ID", "TYPE", "NAME", "DIST (km)", "GAIN (m)"
        ));
        for route in routes {
            let gain = route
                .elev_gain_m
                .map(|g| format!("{:.0}", g))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "{:<12} {:<5} {:<name_width$} {:>10.2} {:>8}\n",
                route.id,
                route.route_type.as_str(),
                route.name,
                route.distance_km,
                gain
            ));
        }
    }

    let noun = if routes.len() == 1 { "route" } else { "routes" };
    out.push_str(&format!("{} {}\n", routes.len(), noun));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::IndexBuilder;
    use crate::data::{BoundingBox, RouteSummary};
    use chrono::Utc;

    fn manifest() -> Manifest {
        let bbox = BoundingBox {
            south: 0.0,
            west: 0.0,
            north: 1.0,
            east: 1.0,
        };
        let mut builder = IndexBuilder::new(None);
        for (id, name, route_type) in [
            (1, "Stanley Park Loop", RouteType::Ride),
            (2, "Seawall Run", RouteType::Run),
            (3, "Cypress Climb", RouteType::Ride),
            (4, "Grouse Grind", RouteType::Other),
        ] {
            let summary = RouteSummary {
                id,
                name: name.to_string(),
                route_type,
                distance_m: 12_340.0,
                elev_gain_m: if id == 4 { None } else { Some(250.0) },
                updated_at: None,
                summary_polyline: None,
            };
            builder.push(ManifestRoute::new(&summary, "s", bbox, format!("routes/{}.geojson", id)));
        }
        builder.build(Utc::now())
    }

    fn ids(routes: &[&ManifestRoute]) -> Vec<u64> {
        routes.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_default_filter_keeps_everything() {
        let manifest = manifest();
        assert_eq!(RouteFilter::default().apply(&manifest).len(), 4);
    }

    #[test]
    fn test_query_is_case_insensitive() {
        let manifest = manifest();
        let filter = RouteFilter::new(Some("SEAWALL".to_string()), Vec::new());
        assert_eq!(ids(&filter.apply(&manifest)), vec![2]);
    }

    #[test]
    fn test_blank_query_is_ignored() {
        let filter = RouteFilter::new(Some("   ".to_string()), Vec::new());
        assert!(filter.query.is_none());
    }

    #[test]
    fn test_type_filter() {
        let manifest = manifest();
        let filter = RouteFilter::new(None, vec![RouteType::Ride]);
        assert_eq!(ids(&filter.apply(&manifest)), vec![3, 1]);

        let filter = RouteFilter::new(None, vec![RouteType::Run, RouteType::Other]);
        assert_eq!(ids(&filter.apply(&manifest)), vec![4, 2]);
    }

    #[test]
    fn test_query_and_type_combine() {
        let manifest = manifest();
        let filter = RouteFilter::new(Some("park".to_string()), vec![RouteType::Run]);
        assert!(filter.apply(&manifest).is_empty());
    }

    #[test]
    fn test_render_list_rows_and_count() {
        let manifest = manifest();
        let routes = RouteFilter::new(Some("grind".to_string()), Vec::new()).apply(&manifest);
        let out = render_list(&routes);

        assert!(out.contains("Grouse Grind"));
        assert!(out.contains("12.34"));
        assert!(out.lines().nth(1).unwrap().ends_with('-'));
        assert!(out.ends_with("1 route\n"));
    }

    #[test]
    fn test_render_empty_manifest() {
        let manifest = IndexBuilder::new(None).build(Utc::now());
        let routes = RouteFilter::default().apply(&manifest);

        assert_eq!(render_list(&routes), "0 routes\n");
    }
}
