//! Storage backend capability consumed by the browser.
//!
//! A backend lists objects under a prefix (collapsing nested names into
//! common prefixes), reports object attributes and opens object payloads.
//! Retry policy, if any, belongs to the implementation.

pub mod catalog;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::{io, pin::Pin};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::models::attributes::{ListItem, ObjectAttributes};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("object `{object}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, object: String },
    #[error("invalid object name `{0}`")]
    InvalidObjectName(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BackendError {
    /// Absence, as opposed to the backend being unavailable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Lazy, finite listing. Items arrive in name order; an `Err` item ends it.
pub type ObjectListing = BoxStream<'static, BackendResult<ListItem>>;

/// An open object payload together with the attributes observed at open time.
pub struct ObjectReader {
    pub attrs: ObjectAttributes,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// List names under `prefix`, grouping anything past the next `delimiter`.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> BackendResult<ObjectListing>;

    async fn object_attributes(&self, bucket: &str, name: &str)
    -> BackendResult<ObjectAttributes>;

    async fn open_object(&self, bucket: &str, name: &str) -> BackendResult<ObjectReader>;

    /// Read a whole object into memory. Meant for small objects only.
    async fn read_all(&self, bucket: &str, name: &str) -> BackendResult<Vec<u8>> {
        let mut object = self.open_object(bucket, name).await?;
        let mut buf = Vec::with_capacity(object.attrs.size as usize);
        object.reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Readiness probe.
    async fn check(&self) -> BackendResult<()>;
}
