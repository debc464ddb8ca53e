//! Cache module for route geometry and the manifest
//!
//! This module owns everything that touches the content directory: the slug
//! and file naming rules, the GeoJSON files written per route, and the
//! manifest the viewer reads. Files are plain JSON so the directory can be
//! published as-is by any static file server.

pub mod index;
mod manager;
mod slug;

pub use index::{IndexBuilder, Manifest, ManifestRoute};
pub use manager::{geometry_file_name, CacheError, CacheManager};
pub use slug::slugify;
