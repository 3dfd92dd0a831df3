//! Custom key-value metadata attached to catalogued objects.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One custom metadata pair. Served back verbatim as a response header.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ObjectMetadata {
    /// Reference to the associated object.
    pub object_id: Uuid,

    /// Metadata key (e.g., "x-goog-meta-author").
    pub key: String,

    /// Metadata value as plain text.
    pub value: String,
}
