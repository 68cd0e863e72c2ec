//! Radar scan ingestion library.
//!
//! Drives the Level II decoder against a chunk repository.
//!
//! # Architecture
//!
//! - [`RadarIngester`] lists a station's chunks, selects the latest volume,
//!   fetches its chunks Start-first and feeds them to a
//!   [`level2_parser::ScanAssembler`]
//! - [`composite`] decodes many stations concurrently and merges their gates
//!   onto a shared grid
//! - [`MetricsObserver`] turns decode events into `metrics` counters

pub mod composite;
pub mod error;
mod ingester;
pub mod metrics;

// Re-exports
pub use composite::{build_composite, merge_scans, Composite, CompositeOptions};
pub use error::{IngestionError, Result};
pub use ingester::{RadarIngester, ScanReport};
pub use self::metrics::MetricsObserver;
