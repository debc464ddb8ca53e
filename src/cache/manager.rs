//! Cache manager for route geometry files and the manifest
//!
//! Provides a `CacheManager` that writes each route's GeoJSON to a file named
//! from its id and slug, and reads and writes the manifest that lists them.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::index::Manifest;
use crate::data::RouteGeometry;

/// Prefix shared by every geometry file the cache writes
const FILE_PREFIX: &str = "strava_route_";

/// Extension of geometry files
const FILE_EXTENSION: &str = "geojson";

/// Errors that can occur when reading or writing the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// A filesystem operation failed
    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A document could not be serialized or parsed
    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Builds the geometry file name for a route
pub fn geometry_file_name(route_id: u64, slug: &str) -> String {
    format!("{}{}_{}.{}", FILE_PREFIX, route_id, slug, FILE_EXTENSION)
}

/// Whether `name` looks like a geometry file written by this cache
fn is_geometry_file(name: &str) -> bool {
    name.starts_with(FILE_PREFIX) && name.ends_with(&format!(".{}", FILE_EXTENSION))
}

/// Manages the on-disk route cache
///
/// Geometry files live directly in `routes_dir`. The manifest usually lives in
/// the same directory as `index.json`, but can be placed anywhere.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where geometry files are stored
    routes_dir: PathBuf,
    /// Path of the manifest file
    index_path: PathBuf,
}

impl CacheManager {
    /// Creates a new CacheManager for the given directory and manifest path
    pub fn new(routes_dir: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            routes_dir: routes_dir.into(),
            index_path: index_path.into(),
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Ensures the cache directory exists
    pub fn ensure_dir(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.routes_dir).map_err(|source| CacheError::Io {
            action: "Failed to create directory",
            path: self.routes_dir.clone(),
            source,
        })
    }

    /// Path of a geometry file inside the cache directory
    pub fn geometry_path(&self, file_name: &str) -> PathBuf {
        self.routes_dir.join(file_name)
    }

    /// Path of a geometry file as the viewer sees it
    ///
    /// The viewer is served from the parent of the routes directory, so paths
    /// are prefixed with the directory's own name (`routes/<file>`).
    pub fn site_path(&self, file_name: &str) -> String {
        match self.routes_dir.file_name() {
            Some(dir) => format!("{}/{}", dir.to_string_lossy(), file_name),
            None => file_name.to_string(),
        }
    }

    /// Whether a geometry file is present in the cache
    pub fn contains(&self, file_name: &str) -> bool {
        self.geometry_path(file_name).is_file()
    }

    /// Writes a route's geometry, overwriting any previous content
    ///
    /// # Arguments
    /// * `file_name` - Name produced by [`geometry_file_name`]
    /// * `geometry` - The GeoJSON document to store
    ///
    /// # Returns
    /// * `Ok(PathBuf)` with the full path written
    /// * `Err(CacheError)` if serialization or the write fails
    pub fn write_geometry(
        &self,
        file_name: &str,
        geometry: &RouteGeometry,
    ) -> Result<PathBuf, CacheError> {
        let path = self.geometry_path(file_name);
        write_json(&path, geometry)?;
        debug!(path = %path.display(), "Wrote geometry file");
        Ok(path)
    }

    /// Loads the manifest, failing if it is missing or malformed
    pub fn load_manifest(&self) -> Result<Manifest, CacheError> {
        let content = fs::read_to_string(&self.index_path).map_err(|source| CacheError::Io {
            action: "Failed to read",
            path: self.index_path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CacheError::Json {
            path: self.index_path.clone(),
            source,
        })
    }

    /// Reads the previous manifest, if there is a usable one
    ///
    /// Returns `None` when the manifest doesn't exist or cannot be parsed; a
    /// malformed manifest only costs a full re-download.
    pub fn read_manifest(&self) -> Option<Manifest> {
        match self.load_manifest() {
            Ok(manifest) => Some(manifest),
            Err(CacheError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Ignoring previous manifest: {}", e);
                None
            }
        }
    }

    /// Writes the manifest, replacing the previous one in full
    ///
    /// The content goes to a sibling temporary file first and is renamed over
    /// the old manifest, so readers never observe a partial file.
    pub fn write_manifest(&self, manifest: &Manifest) -> Result<(), CacheError> {
        if let Some(parent) = self.index_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                action: "Failed to create directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp_path = self.index_path.with_extension("json.tmp");
        write_json(&tmp_path, manifest)?;
        fs::rename(&tmp_path, &self.index_path).map_err(|source| CacheError::Io {
            action: "Failed to replace",
            path: self.index_path.clone(),
            source,
        })
    }

    /// Lists cached geometry files that are not in `referenced`
    pub fn orphans(&self, referenced: &HashSet<String>) -> Result<Vec<PathBuf>, CacheError> {
        let entries = match fs::read_dir(&self.routes_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    action: "Failed to list",
                    path: self.routes_dir.clone(),
                    source,
                })
            }
        };

        let mut orphans = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CacheError::Io {
                action: "Failed to list",
                path: self.routes_dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_geometry_file(&name) && !referenced.contains(&name) {
                orphans.push(entry.path());
            }
        }

        orphans.sort();
        Ok(orphans)
    }

    /// Deletes cached geometry files that are not in `referenced`
    ///
    /// # Returns
    /// * `Ok(Vec<PathBuf>)` with the paths removed
    /// * `Err(CacheError)` if listing or removal fails
    pub fn prune_orphans(&self, referenced: &HashSet<String>) -> Result<Vec<PathBuf>, CacheError> {
        let orphans = self.orphans(referenced)?;
        for path in &orphans {
            fs::remove_file(path).map_err(|source| CacheError::Io {
                action: "Failed to remove",
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "Removed orphaned geometry file");
        }
        Ok(orphans)
    }
}

/// Serializes `value` as pretty JSON with a trailing newline and writes it to `path`
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let mut json = serde_json::to_string_pretty(value).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');

    fs::write(path, json).map_err(|source| CacheError::Io {
        action: "Failed to write",
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::index::IndexBuilder;
    use crate::data::{materialize, RouteSummary, RouteType};
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_cache() -> (CacheManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let routes_dir = temp_dir.path().join("routes");
        let cache = CacheManager::new(&routes_dir, routes_dir.join("index.json"));
        cache.ensure_dir().expect("Should create routes dir");
        (cache, temp_dir)
    }

    fn geometry() -> RouteGeometry {
        let summary = RouteSummary {
            id: 1,
            name: "Loop".to_string(),
            route_type: RouteType::Ride,
            distance_m: 1500.0,
            elev_gain_m: None,
            updated_at: None,
            summary_polyline: None,
        };
        materialize(&summary, "loop", "_p~iF~ps|U_ulLnnqC").unwrap()
    }

    #[test]
    fn test_geometry_file_name() {
        assert_eq!(
            geometry_file_name(123, "stanley-park"),
            "strava_route_123_stanley-park.geojson"
        );
    }

    #[test]
    fn test_is_geometry_file() {
        assert!(is_geometry_file("strava_route_1_loop.geojson"));
        assert!(!is_geometry_file("index.json"));
        assert!(!is_geometry_file("strava_route_1_loop.json"));
        assert!(!is_geometry_file("notes.geojson"));
    }

    #[test]
    fn test_site_path_uses_directory_name() {
        let cache = CacheManager::new("/srv/site/routes", "/srv/site/routes/index.json");
        assert_eq!(cache.site_path("a.geojson"), "routes/a.geojson");
    }

    #[test]
    fn test_write_geometry_creates_file() {
        let (cache, _temp_dir) = create_test_cache();

        let path = cache
            .write_geometry("strava_route_1_loop.geojson", &geometry())
            .expect("Write should succeed");

        assert!(path.exists(), "Geometry file should exist");
        assert!(cache.contains("strava_route_1_loop.geojson"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"FeatureCollection\""));
        assert!(content.contains("\"LineString\""));
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_write_geometry_is_byte_identical_on_rewrite() {
        let (cache, _temp_dir) = create_test_cache();
        let geometry = geometry();

        let path = cache.write_geometry("strava_route_1_loop.geojson", &geometry).unwrap();
        let first = fs::read(&path).unwrap();
        cache.write_geometry("strava_route_1_loop.geojson", &geometry).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_read_manifest_returns_none_when_missing() {
        let (cache, _temp_dir) = create_test_cache();
        assert!(cache.read_manifest().is_none());
        assert!(matches!(cache.load_manifest(), Err(CacheError::Io { .. })));
    }

    #[test]
    fn test_read_manifest_returns_none_when_malformed() {
        let (cache, _temp_dir) = create_test_cache();
        fs::write(cache.index_path(), "{ not json").unwrap();

        assert!(cache.read_manifest().is_none());
        assert!(matches!(cache.load_manifest(), Err(CacheError::Json { .. })));
    }

    #[test]
    fn test_manifest_roundtrip_and_no_temp_left_behind() {
        let (cache, _temp_dir) = create_test_cache();
        let manifest = IndexBuilder::new(Some(3)).build(Utc::now());

        cache.write_manifest(&manifest).expect("Write should succeed");

        let back = cache.read_manifest().expect("Should read manifest");
        assert_eq!(back, manifest);
        assert!(!cache.index_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_write_manifest_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let index_path = temp_dir.path().join("site").join("data").join("index.json");
        let cache = CacheManager::new(temp_dir.path().join("routes"), &index_path);

        cache
            .write_manifest(&IndexBuilder::new(None).build(Utc::now()))
            .expect("Write should succeed");

        assert!(index_path.exists());
    }

    #[test]
    fn test_write_manifest_overwrites_previous() {
        let (cache, _temp_dir) = create_test_cache();

        cache.write_manifest(&IndexBuilder::new(Some(1)).build(Utc::now())).unwrap();
        cache.write_manifest(&IndexBuilder::new(Some(2)).build(Utc::now())).unwrap();

        assert_eq!(cache.read_manifest().unwrap().athlete_id, Some(2));
    }

    #[test]
    fn test_orphans_only_lists_unreferenced_geometry_files() {
        let (cache, _temp_dir) = create_test_cache();
        cache.write_geometry("strava_route_1_a.geojson", &geometry()).unwrap();
        cache.write_geometry("strava_route_2_b.geojson", &geometry()).unwrap();
        fs::write(cache.geometry_path("notes.txt"), "keep me").unwrap();
        cache.write_manifest(&IndexBuilder::new(None).build(Utc::now())).unwrap();

        let referenced: HashSet<String> = ["strava_route_1_a.geojson".to_string()].into();
        let orphans = cache.orphans(&referenced).unwrap();

        assert_eq!(orphans, vec![cache.geometry_path("strava_route_2_b.geojson")]);
    }

    #[test]
    fn test_prune_orphans_removes_files() {
        let (cache, _temp_dir) = create_test_cache();
        cache.write_geometry("strava_route_1_a.geojson", &geometry()).unwrap();
        cache.write_geometry("strava_route_2_b.geojson", &geometry()).unwrap();

        let referenced: HashSet<String> = ["strava_route_1_a.geojson".to_string()].into();
        let removed = cache.prune_orphans(&referenced).unwrap();

        assert_eq!(removed.len(), 1);
        assert!(cache.contains("strava_route_1_a.geojson"));
        assert!(!cache.contains("strava_route_2_b.geojson"));
    }

    #[test]
    fn test_orphans_of_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CacheManager::new(temp_dir.path().join("absent"), temp_dir.path().join("i.json"));

        assert!(cache.orphans(&HashSet::new()).unwrap().is_empty());
    }
}
