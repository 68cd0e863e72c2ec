//! Chunk byte cache.
//!
//! Published chunks are immutable, so fetched bytes can be kept by key for
//! as long as there is room. Listings are passed straight through because
//! a volume keeps gaining chunks until its End chunk lands.

use async_trait::async_trait;
use bytes::Bytes;
use level2_parser::ChunkListing;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::repository::ChunkRepository;

/// LRU cache of chunk bytes in front of another [`ChunkRepository`].
pub struct CachedChunkRepository {
    chunks: Mutex<LruCache<String, Bytes>>,
    inner: Arc<dyn ChunkRepository>,
    counters: Counters,
    capacity: NonZeroUsize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    bytes_cached: AtomicU64,
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Bytes currently held
    pub bytes_cached: u64,
}

impl CacheStats {
    /// Hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            lookups => self.hits as f64 * 100.0 / lookups as f64,
        }
    }
}

impl CachedChunkRepository {
    /// Cache at most `capacity` chunks from `inner`.
    pub fn new(inner: Arc<dyn ChunkRepository>, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| StorageError::Config("chunk cache capacity must be > 0".to_string()))?;

        Ok(Self {
            chunks: Mutex::new(LruCache::new(capacity)),
            inner,
            counters: Counters::default(),
            capacity,
        })
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            bytes_cached: self.counters.bytes_cached.load(Ordering::Relaxed),
        }
    }

    pub async fn len(&self) -> usize {
        self.chunks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.lock().await.is_empty()
    }

    /// Drop every cached chunk. Hit and miss counts are kept.
    pub async fn clear(&self) {
        self.chunks.lock().await.clear();
        self.counters.bytes_cached.store(0, Ordering::Relaxed);
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

#[async_trait]
impl ChunkRepository for CachedChunkRepository {
    async fn list_chunks(&self, station: &str) -> Result<Vec<ChunkListing>> {
        self.inner.list_chunks(station).await
    }

    async fn fetch_chunk(&self, key: &str) -> Result<Bytes> {
        if let Some(bytes) = self.chunks.lock().await.get(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(bytes.clone());
        }

        // Errors propagate without touching the cache
        let bytes = self.inner.fetch_chunk(key).await?;
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let displaced = self.chunks.lock().await.push(key.to_string(), bytes.clone());
        self.counters
            .bytes_cached
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        if let Some((displaced_key, displaced_bytes)) = displaced {
            self.counters
                .bytes_cached
                .fetch_sub(displaced_bytes.len() as u64, Ordering::Relaxed);
            // A concurrent miss on the same key replaces rather than evicts
            if displaced_key != key {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(evicted = %displaced_key, "Evicted chunk from cache");
            }
        }

        Ok(bytes)
    }

    async fn list_stations(&self) -> Result<Vec<String>> {
        self.inner.list_stations().await
    }
}
