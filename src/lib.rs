//! routecache library
//!
//! Fetches routes from the Strava API, caches each one as a GeoJSON file and
//! publishes a manifest that a static map viewer reads. The binary in
//! `main.rs` is a thin wrapper around [`sync::run_sync`] and [`viewer`].

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod sync;
pub mod viewer;
