//! TTL read cache for backend query results
//!
//! Entries are keyed by an xxh3 fingerprint of the index name and the
//! canonical form of the query JSON, so key order and whitespace in the
//! request do not matter. Expired entries are evicted lazily on lookup; the
//! LRU capacity bounds memory in between.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: Instant,
}

impl CacheEntry {
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
}

/// Serialize `value` with object keys sorted at every level
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Fingerprint of a read request
#[must_use]
pub fn fingerprint(index: &str, query: &Value) -> u64 {
    let mut canonical = String::with_capacity(128);
    canonical.push_str(index);
    canonical.push('\n');
    write_canonical(query, &mut canonical);
    xxh3_64(canonical.as_bytes())
}

pub struct QueryCache {
    entries: Mutex<LruCache<u64, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl QueryCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry, dropping it if it has expired
    pub fn get(&self, key: u64, now: Instant) -> Option<Value> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(&key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(&key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: u64, value: Value, now: Instant) {
        let entry = CacheEntry {
            value,
            expires_at: now + self.ttl,
        };
        self.entries.lock().put(key, entry);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}
