//! Size-bounded cache of README payloads rendered under directory listings.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, info};

use crate::{
    backend::{BackendResult, StorageBackend},
    models::attributes::ObjectAttributes,
};

pub const DEFAULT_README_CACHE_BYTES: usize = 16 * 1024 * 1024;

struct CachedReadme {
    content: Bytes,
    /// Last-modified instant of the object when it was read.
    source_timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CachedReadme>,
    /// Keys in first-insertion order; eviction pops from the front.
    order: VecDeque<String>,
    total_bytes: usize,
}

/// README cache keyed by `bucket/name`, evicting in first-insertion order
/// once the byte budget is exceeded.
///
/// An entry is served while its stored timestamp is not older than the
/// object's current last-modified instant. Payloads are stored only after a
/// complete read.
pub struct ReadmeCache {
    backend: Arc<dyn StorageBackend>,
    max_bytes: usize,
    state: Mutex<CacheState>,
}

impl ReadmeCache {
    pub fn new(backend: Arc<dyn StorageBackend>, max_bytes: usize) -> Self {
        Self {
            backend,
            max_bytes,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Return the payload of the object described by `attrs`, from cache when fresh.
    pub async fn fetch(&self, attrs: &ObjectAttributes) -> BackendResult<Bytes> {
        let key = cache_key(attrs);
        if let Some(content) = self.lookup(&key, attrs.updated) {
            debug!(key = %key, "readme cache hit");
            return Ok(content);
        }

        info!(bucket = %attrs.bucket, name = %attrs.name, "fetching readme");
        let content = Bytes::from(self.backend.read_all(&attrs.bucket, &attrs.name).await?);
        self.store(key, content.clone(), attrs.updated);
        Ok(content)
    }

    fn lookup(&self, key: &str, current: DateTime<Utc>) -> Option<Bytes> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .entries
            .get(key)
            .filter(|entry| entry.source_timestamp >= current)
            .map(|entry| entry.content.clone())
    }

    /// Insert or overwrite `key`, then evict until within budget.
    fn store(&self, key: String, content: Bytes, source_timestamp: DateTime<Utc>) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;

        // A slower concurrent read of an older revision must not win.
        if let Some(existing) = state.entries.get(&key) {
            if existing.source_timestamp > source_timestamp {
                return;
            }
        }

        let size = content.len();
        let previous = state.entries.insert(
            key.clone(),
            CachedReadme {
                content,
                source_timestamp,
            },
        );
        match previous {
            Some(previous) => {
                state.total_bytes = state.total_bytes - previous.content.len() + size;
            }
            None => {
                state.total_bytes += size;
                state.order.push_back(key);
            }
        }

        while state.total_bytes > self.max_bytes {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            if let Some(evicted) = state.entries.remove(&oldest) {
                state.total_bytes -= evicted.content.len();
                debug!(key = %oldest, size = state.total_bytes, "evicted readme");
            }
        }
    }
}

#[cfg(test)]
impl ReadmeCache {
    fn cached_bytes(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total_bytes
    }

    fn queued_keys(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .iter()
            .cloned()
            .collect()
    }
}

fn cache_key(attrs: &ObjectAttributes) -> String {
    format!("{}/{}", attrs.bucket, attrs.name)
}
