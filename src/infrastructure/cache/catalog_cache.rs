//! In-memory LRU cache of assembled catalog responses.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::domain::entities::{CatalogResponse, SourceMode, WorkbookIdentity};

/// Default number of (mode, identity) entries kept.
pub const DEFAULT_CATALOG_CAPACITY: usize = 8;

type CatalogKey = (SourceMode, WorkbookIdentity);

/// A cached catalog response.
#[derive(Debug, Clone)]
pub struct CachedCatalogEntry {
    /// Assembled response.
    pub response: Arc<CatalogResponse>,
    /// Identity-derived entity tag.
    pub etag: String,
    /// Identity the response was built from.
    pub identity: WorkbookIdentity,
    /// When the entry was stored.
    pub stored_at: DateTime<Utc>,
    /// Wall-clock expiry, checked lazily on read.
    pub expires_at: DateTime<Utc>,
}

impl CachedCatalogEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached catalogs.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Catalog cache: {} entries, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}

/// Catalog cache keyed by source mode and workbook identity.
pub struct MemoryCatalogCache {
    cache: RwLock<LruCache<CatalogKey, CachedCatalogEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCatalogCache {
    /// Creates a new cache with the specified capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a live entry for `(mode, identity)`.
    pub async fn get(&self, mode: SourceMode, identity: &WorkbookIdentity) -> Option<CachedCatalogEntry> {
        self.get_at(mode, identity, Utc::now()).await
    }

    pub(crate) async fn get_at(
        &self,
        mode: SourceMode,
        identity: &WorkbookIdentity,
        now: DateTime<Utc>,
    ) -> Option<CachedCatalogEntry> {
        let key = (mode, identity.clone());
        let mut cache = self.cache.write().await;

        match cache.get(&key).cloned() {
            Some(entry) if entry.is_live(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(mode = %mode, identity = %identity, "Catalog cache hit");
                Some(entry)
            }
            Some(_) => {
                cache.pop(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(mode = %mode, identity = %identity, "Catalog cache entry expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(mode = %mode, identity = %identity, "Catalog cache miss");
                None
            }
        }
    }

    /// Stores a response for `ttl`. A zero TTL disables caching.
    pub async fn put(
        &self,
        mode: SourceMode,
        identity: &WorkbookIdentity,
        response: Arc<CatalogResponse>,
        etag: String,
        ttl: Duration,
    ) {
        self.put_at(mode, identity, response, etag, ttl, Utc::now())
            .await;
    }

    pub(crate) async fn put_at(
        &self,
        mode: SourceMode,
        identity: &WorkbookIdentity,
        response: Arc<CatalogResponse>,
        etag: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) {
        if ttl.is_zero() {
            trace!(mode = %mode, "Catalog caching disabled");
            return;
        }

        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let entry = CachedCatalogEntry {
            response,
            etag,
            identity: identity.clone(),
            stored_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut cache = self.cache.write().await;
        debug!(mode = %mode, identity = %identity, expires_at = %entry.expires_at, "Storing catalog");
        cache.put((mode, identity.clone()), entry);
    }

    /// Most recently stored live entry for `mode`, regardless of identity.
    ///
    /// Used to keep serving while the source cannot be reached.
    pub async fn latest(&self, mode: SourceMode) -> Option<CachedCatalogEntry> {
        self.latest_at(mode, Utc::now()).await
    }

    pub(crate) async fn latest_at(
        &self,
        mode: SourceMode,
        now: DateTime<Utc>,
    ) -> Option<CachedCatalogEntry> {
        let cache = self.cache.read().await;
        cache
            .iter()
            .filter(|((entry_mode, _), entry)| *entry_mode == mode && entry.is_live(now))
            .map(|(_, entry)| entry)
            .max_by_key(|entry| entry.stored_at)
            .cloned()
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        debug!("Cleared catalog cache");
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        // Best effort while a writer holds the lock.
        self.cache.try_read().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
        }
    }
}

impl Default for MemoryCatalogCache {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_CAPACITY)
    }
}
