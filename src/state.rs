//! Shared state handed to every handler.

use axum::http::HeaderValue;
use std::sync::Arc;

use crate::{
    backend::StorageBackend,
    models::mount::Mount,
    services::{
        listing::{ListingAggregator, ListingOptions},
        mount_table::MountTable,
        object_server::{DEFAULT_CACHE_CONTROL, ObjectServer},
        readme_cache::{DEFAULT_README_CACHE_BYTES, ReadmeCache},
    },
};

/// Rendering and serving switches.
#[derive(Clone, Debug)]
pub struct BrowseOptions {
    pub listing: ListingOptions,
    /// Allow JSON directory responses.
    pub json: bool,
    /// Render the directory README below HTML listings.
    pub readme: bool,
    /// Answer `/favicon.ico` with 404 without touching the backend.
    pub favicon_not_found: bool,
    pub default_cache_control: HeaderValue,
    pub readme_cache_bytes: usize,
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            listing: ListingOptions::default(),
            json: true,
            readme: true,
            favicon_not_found: true,
            default_cache_control: HeaderValue::from_static(DEFAULT_CACHE_CONTROL),
            readme_cache_bytes: DEFAULT_README_CACHE_BYTES,
        }
    }
}

/// Everything a request needs. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub listing: ListingAggregator,
    pub objects: ObjectServer,
    pub readmes: Arc<ReadmeCache>,
    pub backend: Arc<dyn StorageBackend>,
    pub options: Arc<BrowseOptions>,
}

impl AppState {
    pub fn new(mounts: Vec<Mount>, backend: Arc<dyn StorageBackend>, options: BrowseOptions) -> Self {
        let mounts = Arc::new(MountTable::new(mounts));
        Self {
            listing: ListingAggregator::new(
                mounts.clone(),
                backend.clone(),
                options.listing.clone(),
            ),
            objects: ObjectServer::new(
                mounts,
                backend.clone(),
                options.default_cache_control.clone(),
            ),
            readmes: Arc::new(ReadmeCache::new(backend.clone(), options.readme_cache_bytes)),
            backend,
            options: Arc::new(options),
        }
    }
}
