//! Declarative cache policy and the in-memory store used by the cache
//! interceptor.
//!
//! # Design
//! The builder only decides *what* to cache: a mode, a key, and a validity
//! window. `InterceptorChain` owns a `CacheStore` and decides *when* to read
//! or write it. The default key is a SHA-256 digest of the canonical request
//! so reordering query parameters does not split the cache.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::http::{HttpMethod, HttpResponse};
use crate::url::canonicalize;

/// How a request interacts with the response cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheMode {
    /// Never touch the cache. No cache interceptor is installed.
    #[default]
    OnlyNetwork,
    /// Answer from cache only; fail if nothing valid is stored.
    OnlyCache,
    /// Go to the network and store successful responses.
    NetworkSuccessWriteCache,
    /// Answer from cache when possible, otherwise go to the network and store.
    ReadCacheFailedRequestNetwork,
    /// Go to the network and store; fall back to cache on transport failure.
    RequestNetworkFailedReadCache,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStrategy {
    pub mode: CacheMode,
    /// Explicit key; filled with the request digest at build time when unset.
    pub key: Option<String>,
    /// How long a stored response stays valid. `None` never expires.
    pub valid_time: Option<Duration>,
}

impl CacheStrategy {
    pub fn new(mode: CacheMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn uses_cache(&self) -> bool {
        self.mode != CacheMode::OnlyNetwork
    }
}

/// Lowercase hex SHA-256 of method, canonical URL, and encoded body.
pub fn default_cache_key(method: HttpMethod, url: &str, body: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonicalize(url).as_bytes());
    hasher.update(b"\n");
    if let Some(body) = body {
        hasher.update(body);
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
struct Entry {
    response: HttpResponse,
    stored_at: Instant,
}

/// Thread-safe response cache keyed by `CacheStrategy::key`.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored response for `key` if it is younger than `valid_time`.
    /// Expired entries are evicted on lookup.
    pub fn get(&self, key: &str, valid_time: Option<Duration>) -> Option<HttpResponse> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        let fresh = valid_time.map_or(true, |valid| entry.stored_at.elapsed() <= valid);
        if fresh {
            Some(entry.response.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn put(&self, key: &str, response: &HttpResponse) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.to_string(),
            Entry {
                response: response.clone(),
                stored_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<HttpResponse> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).map(|entry| entry.response)
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
