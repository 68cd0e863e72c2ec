//! Chunk repository over an object store (public S3 bucket or local mirror).

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use level2_parser::ChunkListing;
use object_store::{aws::AmazonS3Builder, local::LocalFileSystem, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Result, StorageError};

/// Source of chunk listings and chunk bytes.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// List every chunk object under `station`'s prefix.
    async fn list_chunks(&self, station: &str) -> Result<Vec<ChunkListing>>;

    /// Fetch the raw bytes of one chunk.
    async fn fetch_chunk(&self, key: &str) -> Result<Bytes>;

    /// Station identifiers present at the top level of the store.
    async fn list_stations(&self) -> Result<Vec<String>>;
}

/// Configuration for the chunk store connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkStoreConfig {
    /// Bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Custom S3 endpoint (e.g. a MinIO mirror)
    pub endpoint: Option<String>,
    /// Skip request signing (the public bucket needs no credentials)
    pub anonymous: bool,
    /// Allow HTTP (for local S3-compatible endpoints)
    pub allow_http: bool,
    /// Read from a directory laid out like the bucket instead of S3
    pub local_root: Option<PathBuf>,
    /// Maximum keys returned by one station listing
    pub listing_limit: Option<usize>,
}

impl Default for ChunkStoreConfig {
    fn default() -> Self {
        Self {
            bucket: "unidata-nexrad-level2-chunks".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            anonymous: true,
            allow_http: false,
            local_root: None,
            listing_limit: None,
        }
    }
}

/// [`ChunkRepository`] backed by any `object_store` implementation.
pub struct ObjectStoreChunkRepository {
    store: Arc<dyn ObjectStore>,
    /// Bucket name or mirror root, for logging
    source: String,
    listing_limit: Option<usize>,
}

impl ObjectStoreChunkRepository {
    /// Create a repository from config.
    ///
    /// A `local_root` takes precedence over the S3 settings.
    pub fn new(config: &ChunkStoreConfig) -> Result<Self> {
        if let Some(root) = &config.local_root {
            let store = LocalFileSystem::new_with_prefix(root)?;
            return Ok(Self {
                store: Arc::new(store),
                source: root.display().to_string(),
                listing_limit: config.listing_limit,
            });
        }

        if config.bucket.is_empty() {
            return Err(StorageError::Config("bucket name is empty".to_string()));
        }

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }
        if config.anonymous {
            builder = builder.with_skip_signature(true);
        }

        let store = builder.build()?;

        Ok(Self {
            store: Arc::new(store),
            source: config.bucket.clone(),
            listing_limit: config.listing_limit,
        })
    }

    /// Wrap an existing store.
    pub fn from_store(store: Arc<dyn ObjectStore>, source: impl Into<String>) -> Self {
        Self {
            store,
            source: source.into(),
            listing_limit: None,
        }
    }

    pub fn with_listing_limit(mut self, limit: Option<usize>) -> Self {
        self.listing_limit = limit;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[async_trait]
impl ChunkRepository for ObjectStoreChunkRepository {
    #[instrument(skip(self), fields(source = %self.source))]
    async fn list_chunks(&self, station: &str) -> Result<Vec<ChunkListing>> {
        validate_station(station)?;

        let prefix = Path::from(station);
        let limit = self.listing_limit.unwrap_or(usize::MAX);
        let mut listings = Vec::new();

        let mut stream = self.store.list(Some(&prefix));
        while let Some(meta) = stream.try_next().await? {
            listings.push(ChunkListing::new(
                meta.location.to_string(),
                meta.last_modified,
                meta.size as u64,
            ));
            if listings.len() >= limit {
                break;
            }
        }

        debug!(count = listings.len(), "Listed chunks");
        Ok(listings)
    }

    #[instrument(skip(self), fields(source = %self.source))]
    async fn fetch_chunk(&self, key: &str) -> Result<Bytes> {
        let location = Path::from(key);

        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let bytes = result.bytes().await?;

        debug!(size = bytes.len(), "Fetched chunk");
        Ok(bytes)
    }

    #[instrument(skip(self), fields(source = %self.source))]
    async fn list_stations(&self) -> Result<Vec<String>> {
        let listing = self.store.list_with_delimiter(None).await?;

        let mut stations: Vec<String> = listing
            .common_prefixes
            .iter()
            .filter_map(|prefix| prefix.filename())
            .filter(|name| is_station_id(name))
            .map(str::to_string)
            .collect();
        stations.sort();

        debug!(count = stations.len(), "Listed stations");
        Ok(stations)
    }
}

fn validate_station(station: &str) -> Result<()> {
    if station.is_empty() || station.contains('/') {
        return Err(StorageError::InvalidStation(station.to_string()));
    }
    Ok(())
}

/// Four ASCII alphanumerics, e.g. `KTLX`.
fn is_station_id(name: &str) -> bool {
    name.len() == 4 && name.bytes().all(|b| b.is_ascii_alphanumeric())
}
