//! Object attributes as reported by a storage backend.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Everything a backend knows about one object, used verbatim when serving it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectAttributes {
    /// Bucket the object lives in.
    pub bucket: String,

    /// Full object name inside the bucket (backend prefix included).
    pub name: String,

    pub size: u64,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,

    /// Custom metadata, emitted as one response header per pair.
    pub metadata: BTreeMap<String, String>,

    /// Last-modified instant.
    pub updated: DateTime<Utc>,

    /// Entity tag (unquoted).
    pub etag: String,

    /// Hex content hash, if the backend keeps one.
    pub content_hash: Option<String>,
}

/// One result of a delimited listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListItem {
    /// Names sharing the query prefix up to the next delimiter (a "subdirectory").
    CommonPrefix(String),

    /// A concrete object directly under the query prefix.
    Object(ObjectAttributes),
}
