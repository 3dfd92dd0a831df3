//! Represents a catalogued bucket, a top-level container for objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A storage bucket known to the catalog.
///
/// Mounts reference buckets by `name`; the `id` links object rows.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bucket {
    /// Unique identifier for this bucket (UUID for internal DB use).
    pub id: Uuid,

    /// Bucket name, as used in mount specifications.
    pub name: String,

    /// When this bucket was created.
    pub created_at: DateTime<Utc>,
}
