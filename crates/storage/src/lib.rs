//! Chunk storage for NEXRAD Level II volumes.
//!
//! Provides:
//! - A [`ChunkRepository`] trait over the chunks bucket
//! - An `object_store` implementation (public S3 bucket or local mirror)
//! - An in-memory LRU cache for fetched chunk bytes

pub mod cache;
pub mod error;
pub mod repository;

pub use cache::{CacheStats, CachedChunkRepository};
pub use error::{Result, StorageError};
pub use repository::{ChunkRepository, ChunkStoreConfig, ObjectStoreChunkRepository};
