//! Chunk repository tests against in-memory and on-disk object stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use level2_parser::ChunkListing;
use object_store::{memory::InMemory, path::Path, ObjectStore};
use storage::{
    CachedChunkRepository, ChunkRepository, ChunkStoreConfig, ObjectStoreChunkRepository,
    StorageError,
};
use test_utils::{keys, LocalMirror};

async fn seeded_store(objects: &[(&str, &str)]) -> Arc<dyn ObjectStore> {
    let store = InMemory::new();
    for (key, data) in objects {
        store
            .put(&Path::from(*key), Bytes::from(data.as_bytes().to_vec()))
            .await
            .unwrap();
    }
    Arc::new(store)
}

// ============================================================================
// ObjectStoreChunkRepository
// ============================================================================

#[tokio::test]
async fn test_list_chunks_for_station() {
    let store = seeded_store(&[
        (keys::KTLX_START, "start"),
        (keys::KTLX_INTERMEDIATE, "middle"),
        ("KFWS/12/20240427-231512-1-S", "other station"),
    ])
    .await;
    let repo = ObjectStoreChunkRepository::from_store(store, "memory");

    let mut listings = repo.list_chunks("KTLX").await.unwrap();
    listings.sort_by(|a, b| a.key.cmp(&b.key));

    let keys: Vec<&str> = listings.iter().map(|l| l.key.as_str()).collect();
    assert_eq!(keys, vec![keys::KTLX_START, keys::KTLX_INTERMEDIATE]);
    assert_eq!(listings[0].size_bytes, 5);
}

#[tokio::test]
async fn test_listing_limit() {
    let store = seeded_store(&[
        (keys::KTLX_START, "a"),
        (keys::KTLX_INTERMEDIATE, ""),
        (keys::KTLX_END, "c"),
    ])
    .await;
    let repo = ObjectStoreChunkRepository::from_store(store, "memory").with_listing_limit(Some(2));

    assert_eq!(repo.list_chunks("KTLX").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_station_lists_nothing() {
    let store = seeded_store(&[(keys::KTLX_START, "start")]).await;
    let repo = ObjectStoreChunkRepository::from_store(store, "memory");

    assert!(repo.list_chunks("KXYZ").await.unwrap().is_empty());
    assert!(matches!(
        repo.list_chunks("").await,
        Err(StorageError::InvalidStation(_))
    ));
}

#[tokio::test]
async fn test_fetch_chunk() {
    let store = seeded_store(&[(keys::KTLX_START, "chunk bytes")]).await;
    let repo = ObjectStoreChunkRepository::from_store(store, "memory");

    let bytes = repo.fetch_chunk(keys::KTLX_START).await.unwrap();
    assert_eq!(bytes.as_ref(), b"chunk bytes");

    let missing = repo.fetch_chunk(keys::KTLX_END).await;
    assert!(matches!(missing, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_list_stations() {
    let store = seeded_store(&[
        (keys::KTLX_START, "a"),
        ("KAMA/9/20240427-231000-1-S", ""),
        ("index.html", "c"),
        ("docs/readme.txt", "d"),
    ])
    .await;
    let repo = ObjectStoreChunkRepository::from_store(store, "memory");

    assert_eq!(repo.list_stations().await.unwrap(), vec!["KAMA", "KTLX"]);
}

#[tokio::test]
async fn test_local_mirror() {
    let mirror = LocalMirror::new().unwrap();
    mirror.write_chunk(keys::KTLX_START, b"on disk").unwrap();
    mirror.write_chunk(keys::KTLX_END, b"end").unwrap();

    let config = ChunkStoreConfig {
        local_root: Some(mirror.root().to_path_buf()),
        ..Default::default()
    };
    let repo = ObjectStoreChunkRepository::new(&config).unwrap();

    assert_eq!(repo.list_chunks("KTLX").await.unwrap().len(), 2);
    assert_eq!(repo.list_stations().await.unwrap(), vec!["KTLX"]);
    assert_eq!(
        repo.fetch_chunk(keys::KTLX_START).await.unwrap().as_ref(),
        b"on disk"
    );
}

// ============================================================================
// CachedChunkRepository
// ============================================================================

struct CountingRepository {
    inner: ObjectStoreChunkRepository,
    fetches: AtomicUsize,
    lists: AtomicUsize,
}

#[async_trait]
impl ChunkRepository for CountingRepository {
    async fn list_chunks(&self, station: &str) -> storage::Result<Vec<ChunkListing>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list_chunks(station).await
    }

    async fn fetch_chunk(&self, key: &str) -> storage::Result<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_chunk(key).await
    }

    async fn list_stations(&self) -> storage::Result<Vec<String>> {
        self.inner.list_stations().await
    }
}

async fn counting_repository() -> Arc<CountingRepository> {
    let store = seeded_store(&[
        (keys::KTLX_START, "0123456789"),
        (keys::KTLX_INTERMEDIATE, "01234"),
        (keys::KTLX_END, "012"),
    ])
    .await;
    Arc::new(CountingRepository {
        inner: ObjectStoreChunkRepository::from_store(store, "memory"),
        fetches: AtomicUsize::new(0),
        lists: AtomicUsize::new(0),
    })
}

#[tokio::test]
async fn test_cache_hits_skip_inner_fetch() {
    let inner = counting_repository().await;
    let cache = CachedChunkRepository::new(inner.clone(), 4).unwrap();

    cache.fetch_chunk(keys::KTLX_START).await.unwrap();
    cache.fetch_chunk(keys::KTLX_START).await.unwrap();
    cache.fetch_chunk(keys::KTLX_START).await.unwrap();

    assert_eq!(inner.fetches.load(Ordering::SeqCst), 1);
    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.bytes_cached, 10);
    assert!((stats.hit_rate() - 66.666).abs() < 0.01);
}

#[tokio::test]
async fn test_cache_eviction() {
    let inner = counting_repository().await;
    let cache = CachedChunkRepository::new(inner.clone(), 2).unwrap();

    cache.fetch_chunk(keys::KTLX_START).await.unwrap();
    cache.fetch_chunk(keys::KTLX_INTERMEDIATE).await.unwrap();
    cache.fetch_chunk(keys::KTLX_END).await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.bytes_cached, 8);
    assert_eq!(cache.len().await, 2);

    // The oldest entry was evicted and must be fetched again
    cache.fetch_chunk(keys::KTLX_START).await.unwrap();
    assert_eq!(inner.fetches.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_listings_bypass_cache() {
    let inner = counting_repository().await;
    let cache = CachedChunkRepository::new(inner.clone(), 4).unwrap();

    cache.list_chunks("KTLX").await.unwrap();
    cache.list_chunks("KTLX").await.unwrap();
    assert_eq!(inner.lists.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_fetch_not_cached() {
    let inner = counting_repository().await;
    let cache = CachedChunkRepository::new(inner.clone(), 4).unwrap();

    assert!(cache.fetch_chunk("KTLX/585/missing").await.is_err());
    assert!(cache.is_empty().await);
    assert_eq!(cache.stats().misses, 0);
}

#[test]
fn test_zero_capacity_rejected() {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    let inner = Arc::new(ObjectStoreChunkRepository::from_store(store, "memory"));
    assert!(matches!(
        CachedChunkRepository::new(inner, 0),
        Err(StorageError::Config(_))
    ));
}
