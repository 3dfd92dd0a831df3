//! Data models for the bucket browser.
//!
//! Catalog rows (`bucket`, `object`, `metadata`) map to SQLite tables via
//! `sqlx::FromRow`. The remaining types describe the virtual namespace and
//! travel between the backend, the services and the renderers.

pub mod attributes;
pub mod bucket;
pub mod entry;
pub mod metadata;
pub mod mount;
pub mod object;
