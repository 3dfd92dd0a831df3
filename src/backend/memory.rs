//! In-memory backend with failure injection, for exercising the services
//! without a catalog.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use std::{
    collections::{BTreeMap, BTreeSet},
    io::{self, Cursor},
    pin::Pin,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use crate::{
    backend::{BackendError, BackendResult, ObjectListing, ObjectReader, StorageBackend},
    models::attributes::{ListItem, ObjectAttributes},
};

#[derive(Default)]
pub struct MemoryBackend {
    objects: Mutex<BTreeMap<(String, String), (ObjectAttributes, Bytes)>>,
    /// Listing yields this many items and then an error.
    fail_listing_after: Mutex<Option<usize>>,
    /// Objects whose payload cannot be opened.
    unreadable: Mutex<BTreeSet<String>>,
    /// Size reported when the payload is opened, if it differs from the stored attrs.
    open_sizes: Mutex<BTreeMap<String, u64>>,
    /// Payloads that fail after this many bytes have been read.
    read_failures: Mutex<BTreeMap<String, usize>>,
    reads: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) an object. The ETag and hash are both the hex MD5.
    pub fn put(
        &self,
        bucket: &str,
        name: &str,
        body: impl Into<Bytes>,
        updated: DateTime<Utc>,
    ) -> ObjectAttributes {
        let body = body.into();
        let hash = format!("{:x}", md5::compute(&body));
        let attrs = ObjectAttributes {
            bucket: bucket.to_string(),
            name: name.to_string(),
            size: body.len() as u64,
            content_type: None,
            content_encoding: None,
            content_disposition: None,
            cache_control: None,
            metadata: BTreeMap::new(),
            updated,
            etag: hash.clone(),
            content_hash: Some(hash),
        };
        self.put_with(attrs.clone(), body);
        attrs
    }

    /// Store an object with caller-provided attributes.
    pub fn put_with(&self, attrs: ObjectAttributes, body: impl Into<Bytes>) {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((attrs.bucket.clone(), attrs.name.clone()), (attrs, body.into()));
    }

    pub fn fail_listing_after(&self, items: usize) {
        *self
            .fail_listing_after
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(items);
    }

    pub fn make_unreadable(&self, name: &str) {
        self.unreadable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
    }

    /// Report `size` at open time, as if the object changed after its attributes were read.
    pub fn report_size_on_open(&self, name: &str, size: u64) {
        self.open_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), size);
    }

    /// Let reads of `name` fail once `bytes` have been delivered.
    pub fn fail_read_after(&self, name: &str, bytes: usize) {
        self.read_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bytes);
    }

    /// Make the readiness check fail.
    pub fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    /// Number of payload opens so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lookup(&self, bucket: &str, name: &str) -> BackendResult<(ObjectAttributes, Bytes)> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(bucket.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                bucket: bucket.to_string(),
                object: name.to_string(),
            })
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> BackendResult<ObjectListing> {
        let mut items = Vec::new();
        let mut last_prefix: Option<String> = None;
        {
            let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
            for ((b, name), (attrs, _)) in objects.iter() {
                if b != bucket {
                    continue;
                }
                let Some(rest) = name.strip_prefix(prefix) else {
                    continue;
                };
                match rest.find(delimiter).filter(|_| !delimiter.is_empty()) {
                    Some(pos) => {
                        let common = format!("{}{}", prefix, &rest[..pos + delimiter.len()]);
                        if last_prefix.as_deref() != Some(common.as_str()) {
                            items.push(Ok(ListItem::CommonPrefix(common.clone())));
                            last_prefix = Some(common);
                        }
                    }
                    None => items.push(Ok(ListItem::Object(attrs.clone()))),
                }
            }
        }

        let fail_after = *self
            .fail_listing_after
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(n) = fail_after {
            items.truncate(n);
            items.push(Err(BackendError::Io(io::Error::other("listing failed"))));
        }

        Ok(stream::iter(items).boxed())
    }

    async fn object_attributes(
        &self,
        bucket: &str,
        name: &str,
    ) -> BackendResult<ObjectAttributes> {
        self.lookup(bucket, name).map(|(attrs, _)| attrs)
    }

    async fn open_object(&self, bucket: &str, name: &str) -> BackendResult<ObjectReader> {
        let (attrs, body) = self.lookup(bucket, name)?;
        if self
            .unreadable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
        {
            return Err(BackendError::Io(io::Error::other("read failed")));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);

        let mut attrs = attrs;
        if let Some(size) = self
            .open_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            attrs.size = *size;
        }

        let fail_after = self
            .read_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied();
        let reader: Pin<Box<dyn AsyncRead + Send>> = match fail_after {
            Some(bytes) => Box::pin(StreamReader::new(stream::iter(vec![
                Ok(body.slice(..bytes.min(body.len()))),
                Err(io::Error::other("connection reset")),
            ]))),
            None => Box::pin(Cursor::new(body)),
        };
        Ok(ObjectReader { attrs, reader })
    }

    async fn check(&self) -> BackendResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Io(io::Error::other("backend unavailable")));
        }
        Ok(())
    }
}
