//! src/backend/catalog.rs
//!
//! CatalogBackend: a read-only storage backend over a SQLite catalog for
//! object attributes and a local directory for payloads, sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use sqlx::SqlitePool;
use std::{
    collections::BTreeMap,
    io::{self, ErrorKind},
    path::PathBuf,
    sync::Arc,
};
use tokio::fs::{self, File};
use tracing::debug;

use crate::{
    backend::{BackendError, BackendResult, ObjectListing, ObjectReader, StorageBackend},
    models::{
        attributes::{ListItem, ObjectAttributes},
        bucket::Bucket,
        metadata::ObjectMetadata,
        object::Object,
    },
};

/// Catalog schema, applied by `--migrate`.
pub const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const MAX_OBJECT_KEY_LEN: usize = 1024;
const LIST_PAGE_SIZE: usize = 1000;

const OBJECT_COLUMNS: &str = "id, bucket_id, key, content_type, content_encoding, \
     content_disposition, cache_control, size_bytes, etag, md5, last_modified, is_deleted";

/// CatalogBackend serves objects described by SQLite rows and stored on disk.
///
/// Cloning is cheap; the pool is shared.
#[derive(Clone)]
pub struct CatalogBackend {
    /// Shared SQLite connection pool used for catalog lookups.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl CatalogBackend {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Create the catalog tables. Returns the number of statements executed.
    pub async fn migrate(&self) -> BackendResult<usize> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }

        Ok(statements.len())
    }

    /// Reject names that could escape the bucket directory.
    fn ensure_key_safe(&self, key: &str) -> BackendResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.contains("..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if invalid {
            return Err(BackendError::InvalidObjectName(key.to_string()));
        }
        Ok(())
    }

    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Two-level shard identifiers: the first two bytes of MD5(bucket/key) in hex.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Location of an object payload on disk.
    pub fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket_name, key);
        let mut path = self.bucket_root(bucket_name);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_bucket(&self, bucket: &str, object: &str) -> BackendResult<Bucket> {
        sqlx::query_as::<_, Bucket>("SELECT id, name, created_at FROM buckets WHERE name = ?")
            .bind(bucket)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => BackendError::NotFound {
                    bucket: bucket.to_string(),
                    object: object.to_string(),
                },
                other => BackendError::Sqlx(other),
            })
    }

    async fn fetch_object(&self, bucket: &Bucket, key: &str) -> BackendResult<Object> {
        sqlx::query_as::<_, Object>(&format!(
            "SELECT {OBJECT_COLUMNS} FROM objects \
             WHERE key = ? AND bucket_id = ? AND is_deleted = 0"
        ))
        .bind(key)
        .bind(bucket.id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => BackendError::NotFound {
                bucket: bucket.name.clone(),
                object: key.to_string(),
            },
            other => BackendError::Sqlx(other),
        })
    }

    async fn attributes(&self, bucket: &str, key: &str) -> BackendResult<ObjectAttributes> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket, key).await?;
        let object = self.fetch_object(&bucket_rec, key).await?;
        let metadata = fetch_metadata(&self.db, &object).await?;
        Ok(to_attributes(&bucket_rec.name, object, metadata))
    }
}

#[async_trait]
impl StorageBackend for CatalogBackend {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> BackendResult<ObjectListing> {
        let bucket_rec = self.fetch_bucket(bucket, prefix).await?;
        let state = ListState {
            db: self.db.clone(),
            bucket: bucket_rec,
            prefix: prefix.to_string(),
            delimiter: delimiter.to_string(),
            after: String::new(),
            last_prefix: None,
            done: false,
        };

        let pages = stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            let page = state.next_page().await;
            Some((stream::iter(page), state))
        });

        Ok(pages.flatten().boxed())
    }

    async fn object_attributes(
        &self,
        bucket: &str,
        name: &str,
    ) -> BackendResult<ObjectAttributes> {
        self.attributes(bucket, name).await
    }

    async fn open_object(&self, bucket: &str, name: &str) -> BackendResult<ObjectReader> {
        let attrs = self.attributes(bucket, name).await?;

        let file_path = self.object_path(&attrs.bucket, name);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BackendError::NotFound {
                    bucket: bucket.to_string(),
                    object: name.to_string(),
                }
            } else {
                BackendError::Io(err)
            }
        })?;

        Ok(ObjectReader {
            attrs,
            reader: Box::pin(file),
        })
    }

    async fn check(&self) -> BackendResult<()> {
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if one != 1 {
            return Err(BackendError::Io(io::Error::other(format!(
                "unexpected result: {}",
                one
            ))));
        }
        fs::read_dir(&self.base_path).await?;
        Ok(())
    }
}

/// Paging cursor of a delimited listing.
struct ListState {
    db: Arc<SqlitePool>,
    bucket: Bucket,
    prefix: String,
    delimiter: String,
    /// Keyset cursor: the last key already consumed.
    after: String,
    /// Common prefix emitted most recently; keys below it are skipped.
    last_prefix: Option<String>,
    done: bool,
}

impl ListState {
    /// Fetch and translate one page. An error ends the listing after it is yielded.
    async fn next_page(&mut self) -> Vec<BackendResult<ListItem>> {
        let rows = sqlx::query_as::<_, Object>(&format!(
            "SELECT {OBJECT_COLUMNS} FROM objects \
             WHERE bucket_id = ? AND is_deleted = 0 \
               AND substr(key, 1, length(?)) = ? AND key > ? \
             ORDER BY key ASC LIMIT ?"
        ))
        .bind(self.bucket.id)
        .bind(&self.prefix)
        .bind(&self.prefix)
        .bind(&self.after)
        .bind(LIST_PAGE_SIZE as i64)
        .fetch_all(&*self.db)
        .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(err) => {
                self.done = true;
                return vec![Err(BackendError::Sqlx(err))];
            }
        };

        if rows.len() < LIST_PAGE_SIZE {
            self.done = true;
        }

        let mut items = Vec::with_capacity(rows.len());
        for obj in rows {
            self.after = obj.key.clone();

            if !self.delimiter.is_empty() {
                if let Some(prefix) = compute_common_prefix(&obj.key, &self.prefix, &self.delimiter)
                {
                    if self.last_prefix.as_deref() != Some(prefix.as_str()) {
                        items.push(Ok(ListItem::CommonPrefix(prefix.clone())));
                        self.last_prefix = Some(prefix);
                    }
                    continue;
                }
            }

            match fetch_metadata(&self.db, &obj).await {
                Ok(metadata) => items.push(Ok(ListItem::Object(to_attributes(
                    &self.bucket.name,
                    obj,
                    metadata,
                )))),
                Err(err) => {
                    self.done = true;
                    items.push(Err(err));
                    break;
                }
            }
        }

        items
    }
}

async fn fetch_metadata(db: &SqlitePool, object: &Object) -> BackendResult<BTreeMap<String, String>> {
    let rows = sqlx::query_as::<_, ObjectMetadata>(
        "SELECT object_id, key, value FROM object_metadata WHERE object_id = ? ORDER BY key",
    )
    .bind(object.id)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|m| (m.key, m.value)).collect())
}

fn to_attributes(
    bucket: &str,
    object: Object,
    metadata: BTreeMap<String, String>,
) -> ObjectAttributes {
    ObjectAttributes {
        bucket: bucket.to_string(),
        name: object.key,
        size: object.size_bytes.max(0) as u64,
        content_type: object.content_type,
        content_encoding: object.content_encoding,
        content_disposition: object.content_disposition,
        cache_control: object.cache_control,
        metadata,
        updated: object.last_modified,
        etag: object.etag,
        content_hash: object.md5,
    }
}

/// Compute the "common prefix" a key collapses into under `delimiter`.
///
/// Returns None when the key sits directly under `requested_prefix`.
fn compute_common_prefix(key: &str, requested_prefix: &str, delimiter: &str) -> Option<String> {
    let after_prefix = key.strip_prefix(requested_prefix)?;
    let pos = after_prefix.find(delimiter)?;
    Some(format!(
        "{}{}",
        requested_prefix,
        &after_prefix[..pos + delimiter.len()]
    ))
}
