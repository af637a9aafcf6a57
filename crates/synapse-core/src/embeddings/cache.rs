//! Embedding Cache (C5)
//!
//! Bounded TTL cache from `(embedding_model_id, text-prefix)` to a
//! provider-native vector (pre-normalization). Single-owner, independently
//! locked from the rest of the store — it is safe to query concurrently
//! with store mutations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

/// Number of leading characters of the source text used as the cache key
/// (`P = 100`). A keyed hash of the full text would avoid collisions on
/// long shared-prefix texts, but isn't mandated — that's a known, accepted
/// tradeoff rather than a bug.
pub const CACHE_KEY_PREFIX_LEN: usize = 100;

/// Key into the embedding cache: an embedding model identifier paired with
/// the first [`CACHE_KEY_PREFIX_LEN`] characters of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    model: String,
    prefix: String,
}

impl CacheKey {
    pub fn new(model: impl Into<String>, text: &str) -> Self {
        let prefix: String = text.chars().take(CACHE_KEY_PREFIX_LEN).collect();
        Self { model: model.into(), prefix }
    }
}

struct CacheEntry {
    value: Vec<f32>,
    last_touched: Instant,
}

/// Bounded, TTL-evicting cache from [`CacheKey`] to a raw (provider-native,
/// pre-normalization) embedding vector.
///
/// Backed by `lru::LruCache` — the same crate the teacher's `Cargo.toml`
/// carries for query-embedding caching — run *unbounded* so this type
/// keeps full control over eviction order: §4.5's `cleanup` wants a TTL
/// pass before the capacity-driven pass, which a capacity-bounded
/// `LruCache` would short-circuit by silently popping its own tail on
/// every over-capacity `put`, without the chance to drop TTL-expired
/// entries first. `get`/`put` still ride the crate's real recency
/// tracking, so `pop_lru` below *is* "evict the entry with the smallest
/// timestamp" — our own `last_touched` field exists only to answer the
/// TTL question that `LruCache` has no concept of.
pub struct EmbeddingCache {
    max_size: usize,
    ttl: Duration,
    entries: LruCache<CacheKey, CacheEntry>,
}

impl EmbeddingCache {
    /// `max_size` (`M`) and `ttl_ms` (`T`); the documented defaults are
    /// 1000 entries and 1 hour.
    pub fn new(max_size: usize, ttl_ms: i64) -> Self {
        Self {
            max_size,
            ttl: Duration::from_millis(ttl_ms.max(0) as u64),
            entries: LruCache::unbounded(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// On hit, refresh the entry's timestamp (and recency order) and return
    /// the vector. A miss (absent or expired) returns `None` without
    /// mutating state beyond what `cleanup` would also do.
    pub fn get(&mut self, key: &CacheKey) -> Option<Vec<f32>> {
        let expired = self
            .entries
            .peek(key)
            .map(|entry| entry.last_touched.elapsed() > self.ttl)
            .unwrap_or(false);
        if expired {
            self.entries.pop(key);
            return None;
        }

        self.entries.get_mut(key).map(|entry| {
            entry.last_touched = Instant::now();
            entry.value.clone()
        })
    }

    /// Insert `value` under `key`; if size exceeds `max_size` afterward,
    /// run [`Self::cleanup`].
    pub fn put(&mut self, key: CacheKey, value: Vec<f32>) {
        self.entries.put(key, CacheEntry { value, last_touched: Instant::now() });
        if self.entries.len() > self.max_size {
            self.cleanup();
        }
    }

    /// First pass: evict every entry older than `T`. If size is still over
    /// `max_size`, repeatedly pop the least-recently-used entry (`pop_lru`)
    /// until size ≤ `max_size` — recency order and `last_touched` always
    /// agree since both are only ever refreshed together, by `get`/`put`.
    pub fn cleanup(&mut self) {
        let before = self.entries.len();
        let ttl = self.ttl;
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.last_touched.elapsed() > ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }

        while self.entries.len() > self.max_size {
            if self.entries.pop_lru().is_none() {
                break;
            }
        }

        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::trace!(evicted, remaining = self.entries.len(), "embedding cache cleanup");
        }
    }
}

/// Cooperative background sweep task that calls [`EmbeddingCache::cleanup`]
/// every `T/2`. Modeled as a `JoinHandle` plus an `Arc<AtomicBool>` cancel
/// flag rather than pulling in `tokio-util`'s `CancellationToken` — a flag
/// the task polls each tick is enough for a single cooperative background
/// job.
pub struct CacheSweeper {
    handle: tokio::task::JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

impl CacheSweeper {
    /// Spawn the sweep loop against `cache`, ticking every `ttl_ms / 2`.
    pub fn spawn(cache: Arc<Mutex<EmbeddingCache>>, ttl_ms: i64) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_clone = cancel.clone();
        let period = Duration::from_millis((ttl_ms.max(2) / 2) as u64);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if cancel_clone.load(Ordering::Relaxed) {
                    break;
                }
                cache.lock().cleanup();
            }
        });

        Self { handle, cancel }
    }

    /// Signal the loop to stop and wait for it to exit. Called from
    /// `dispose()` — cancel then join.
    pub async fn stop(self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.handle.await;
    }
}
