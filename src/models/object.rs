//! Represents an object row in the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog record of a single stored object.
///
/// The payload itself lives on disk; this row only describes it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Object {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key linking to the parent bucket.
    pub bucket_id: Uuid,

    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Content type (MIME type).
    pub content_type: Option<String>,

    pub content_encoding: Option<String>,

    pub content_disposition: Option<String>,

    pub cache_control: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// Entity tag served as `ETag`.
    pub etag: String,

    /// Hex MD5 of the payload, shown as the listing fingerprint.
    pub md5: Option<String>,

    /// Timestamp when object was last modified.
    pub last_modified: DateTime<Utc>,

    /// Whether the object is marked as deleted (soft delete).
    pub is_deleted: bool,
}
