//! Short-lived cache of sorted listings.
//!
//! Entries are keyed by `(root, filter, sort)`; offset and limit are applied
//! on top of the cached listing, so every page of one listing shares one
//! entry. Entries expire after a fixed TTL and the least recently used entry
//! is evicted once capacity is exceeded.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde_json::{json, Value};

use crate::scan::{EntryFilter, ScanOutcome, SortSpec};

/// Identity of a cached listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Canonical scan root.
    pub root: PathBuf,
    /// Filters the listing was produced with.
    pub filter: EntryFilter,
    /// Order the listing is sorted in.
    pub sort: SortSpec,
}

impl CacheKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(root: PathBuf, filter: EntryFilter, sort: SortSpec) -> Self {
        Self { root, filter, sort }
    }

    /// Deterministic 64-bit digest of the key, for logs.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

struct CacheEntry {
    listing: Arc<ScanOutcome>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Hit, miss and eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Entries dropped for capacity.
    pub evictions: u64,
    /// Entries dropped for age.
    pub expirations: u64,
}

/// TTL + LRU cache of listings.
pub struct ResultCache {
    ttl: Duration,
    entries: LruCache<CacheKey, CacheEntry>,
    stats: CacheStats,
}

impl ResultCache {
    /// Creates an empty cache. A zero capacity is treated as 1.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            stats: CacheStats::default(),
        }
    }

    /// Number of stored listings, including any not yet noticed as expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters since creation.
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Looks up a listing that is still within its TTL.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<ScanOutcome>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&mut self, key: &CacheKey, now: Instant) -> Option<Arc<ScanOutcome>> {
        let fresh = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) if entry.is_fresh(now) => Arc::clone(&entry.listing),
            Some(_) => {
                self.entries.pop(key);
                self.stats.expirations += 1;
                self.stats.misses += 1;
                return None;
            }
        };

        self.stats.hits += 1;
        Some(fresh)
    }

    /// Stores a listing, replacing any previous one under the same key.
    pub fn insert(&mut self, key: CacheKey, listing: Arc<ScanOutcome>) {
        self.insert_at(key, listing, Instant::now());
    }

    fn insert_at(&mut self, key: CacheKey, listing: Arc<ScanOutcome>, now: Instant) {
        let entry = CacheEntry {
            listing,
            expires_at: now + self.ttl,
        };

        // push hands back either the replaced value for this key or the evicted LRU entry
        if let Some((displaced, _)) = self.entries.push(key.clone(), entry) {
            if displaced != key {
                self.stats.evictions += 1;
                tracing::debug!(fingerprint = displaced.fingerprint(), "Evicted cached listing");
            }
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops entries whose TTL has passed.
    pub fn purge_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        self.stats.expirations += expired.len() as u64;
    }

    /// Summary for status reporting.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "entries": self.entries.len(),
            "capacity": self.entries.cap().get(),
            "ttl_secs": self.ttl.as_secs(),
            "hits": self.stats.hits,
            "misses": self.stats.misses,
            "evictions": self.stats.evictions,
            "expirations": self.stats.expirations,
        })
    }
}
