//! Signature caching.
//!
//! [`SignatureCache`] memoizes handler signatures per `Type#method` key. It
//! keeps a process-local layer and can sit in front of a persistent
//! [`CacheBackend`]. Entries are written at most once per key and are never
//! invalidated by the engine.
//!
//! # Lookup outcomes
//!
//! A lookup returns [`CacheLookup`]:
//!
//! - `Hit(entry)`: reuse the entry, no metadata is consulted
//! - `Miss`: build the entry and store it
//! - `Disabled`: build the entry and do not store it

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{trace, warn};

use crate::config::CacheConfig;

// =============================================================================
// Backend contract
// =============================================================================

/// A persistent key/value store for serialized entries.
pub trait CacheBackend: Send + Sync {
    /// Returns the stored value, or `None` on a miss.
    fn fetch(&self, key: &str) -> Option<Value>;

    /// Returns `true` when `key` holds a live value.
    fn contains(&self, key: &str) -> bool;

    /// Stores `value`; a zero `ttl` never expires.
    fn save(&self, key: &str, value: Value, ttl: Duration) -> bool;

    /// Removes `key`, returning whether it existed.
    fn delete(&self, key: &str) -> bool;

    /// Removes everything.
    fn flush_all(&self) -> bool;
}

/// In-memory [`CacheBackend`] with per-entry expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Value, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn live(expires: &Option<Instant>) -> bool {
    expires.is_none_or(|at| Instant::now() < at)
}

impl CacheBackend for MemoryCache {
    fn fetch(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|(_, expires)| live(expires))
            .map(|(value, _)| value.clone())
    }

    fn contains(&self, key: &str) -> bool {
        self.fetch(key).is_some()
    }

    fn save(&self, key: &str, value: Value, ttl: Duration) -> bool {
        let expires = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries.write().insert(key.to_string(), (value, expires));
        true
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    fn flush_all(&self) -> bool {
        self.entries.write().clear();
        true
    }
}

// =============================================================================
// SignatureCache
// =============================================================================

/// Outcome of a signature lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
    Disabled,
}

/// Counters describing cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

/// Process-wide signature cache.
pub struct SignatureCache {
    enabled: bool,
    ttl: Duration,
    backend: Option<Arc<dyn CacheBackend>>,
    local: RwLock<HashMap<String, Value>>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignatureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureCache")
            .field("enabled", &self.enabled)
            .field("backend", &self.backend.is_some())
            .field("entries", &self.local.read().len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl SignatureCache {
    /// Creates an enabled cache with only the process-local layer.
    pub fn new() -> Self {
        Self {
            enabled: true,
            ttl: Duration::ZERO,
            backend: None,
            local: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Creates a cache whose every lookup reports [`CacheLookup::Disabled`].
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Creates a cache as described by `config`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: Duration::from_secs(config.ttl_secs),
            ..Self::new()
        }
    }

    /// Puts a persistent backend behind the local layer.
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Looks up `key`.
    ///
    /// A backend hit is copied into the local layer. An entry that no longer
    /// deserializes is reported as a miss.
    pub fn fetch<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        if !self.enabled {
            return CacheLookup::Disabled;
        }

        let local = self.local.read().get(key).cloned();
        let stored = match local {
            Some(value) => Some(value),
            None => self.backend.as_ref().and_then(|b| b.fetch(key)).inspect(|value| {
                self.local.write().insert(key.to_string(), value.clone());
            }),
        };

        match stored.map(serde_json::from_value::<T>) {
            Some(Ok(entry)) => {
                trace!(key, "signature cache hit");
                self.hits.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Hit(entry)
            }
            Some(Err(err)) => {
                warn!(key, error = %err, "discarding unreadable signature entry");
                self.local.write().remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Miss
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Miss
            }
        }
    }

    /// Stores `entry` under `key` in both layers.
    ///
    /// Returns `false` if the entry could not be serialized or the backend
    /// refused it.
    pub fn save<T: Serialize>(&self, key: &str, entry: &T) -> bool {
        if !self.enabled {
            return false;
        }
        let value = match serde_json::to_value(entry) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "cannot serialize signature entry");
                return false;
            }
        };

        self.writes.fetch_add(1, Ordering::Relaxed);
        let persisted = self
            .backend
            .as_ref()
            .is_none_or(|b| b.save(key, value.clone(), self.ttl));
        self.local.write().insert(key.to_string(), value);
        persisted
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_cache_ttl() {
        let cache = MemoryCache::new();
        assert!(cache.save("a", json!(1), Duration::ZERO));
        assert!(cache.save("b", json!(2), Duration::from_nanos(1)));
        std::thread::sleep(Duration::from_millis(2));

        assert_eq!(cache.fetch("a"), Some(json!(1)));
        assert!(!cache.contains("b"));
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert!(cache.flush_all());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lookup_outcomes() {
        let cache = SignatureCache::new();
        assert_eq!(cache.fetch::<Vec<String>>("T#m"), CacheLookup::Miss);
        assert!(cache.save("T#m", &vec!["id".to_string()]));
        assert_eq!(
            cache.fetch::<Vec<String>>("T#m"),
            CacheLookup::Hit(vec!["id".to_string()])
        );
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                writes: 1
            }
        );

        let disabled = SignatureCache::disabled();
        assert!(!disabled.save("T#m", &1));
        assert_eq!(disabled.fetch::<i32>("T#m"), CacheLookup::Disabled);
    }

    #[test]
    fn test_backend_is_shared_between_caches() {
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryCache::new());
        let first = SignatureCache::new().with_backend(backend.clone());
        first.save("T#m", &json!({"x": 1}));

        let second = SignatureCache::new().with_backend(backend.clone());
        assert_eq!(
            second.fetch::<Value>("T#m"),
            CacheLookup::Hit(json!({"x": 1}))
        );
        assert!(backend.contains("T#m"));
    }

    #[test]
    fn test_unreadable_entry_is_a_miss() {
        let cache = SignatureCache::new();
        cache.save("T#m", &json!("not a number"));
        assert_eq!(cache.fetch::<u32>("T#m"), CacheLookup::Miss);
    }
}
