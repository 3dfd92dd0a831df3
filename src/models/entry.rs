//! Directory listing entries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::attributes::ObjectAttributes;

/// One row of a directory listing.
///
/// Entries without `size` are directory-like (child mounts or common
/// prefixes); entries with `size` are concrete objects. Absent fields are
/// omitted from JSON rather than emitted as null.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Entry {
    #[serde(rename = "item")]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl Entry {
    /// A directory-like entry carrying only its name.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A fully-described object entry named relative to the listed directory.
    pub fn object(name: impl Into<String>, attrs: &ObjectAttributes) -> Self {
        Self {
            name: name.into(),
            size: Some(attrs.size),
            fingerprint: attrs.content_hash.clone(),
            content_type: attrs.content_type.clone(),
            timestamp: Some(attrs.updated),
            metadata: (!attrs.metadata.is_empty()).then(|| attrs.metadata.clone()),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.size.is_none()
    }
}
