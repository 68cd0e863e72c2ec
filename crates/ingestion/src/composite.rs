//! Multi-station composites.
//!
//! Each station is decoded on its own spawned task with no shared state; a
//! station that fails, times out or panics is listed as missing and never
//! affects the others. The surviving scans are merged onto a grid of
//! 1/50 degree cells.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use level2_parser::{DecodeTarget, RadarGate, RadarProduct, RadarScan};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::ingester::RadarIngester;
use crate::metrics::{record_scan_outcome, ScanOutcome};

/// Grid cells per degree used to bucket gates.
pub const CELLS_PER_DEGREE: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeOptions {
    /// Upper bound on stations decoded for one composite
    pub max_stations: usize,
    /// Per-station decode deadline in seconds
    pub station_timeout_secs: u64,
    /// Stations decoded at once
    pub concurrency: usize,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            max_stations: 160,
            station_timeout_secs: 60,
            concurrency: 8,
        }
    }
}

impl CompositeOptions {
    pub fn station_timeout(&self) -> Duration {
        Duration::from_secs(self.station_timeout_secs)
    }
}

/// Merged gates from several stations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composite {
    pub product: RadarProduct,
    pub tilt: u8,
    pub generated_at: DateTime<Utc>,
    /// Stations that contributed a scan
    pub stations: Vec<String>,
    /// Stations that produced no scan
    pub missing: Vec<String>,
    pub gates: Vec<RadarGate>,
}

impl Composite {
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }
}

/// Decode many stations concurrently and merge the results.
///
/// With no explicit station list the repository's station list is used.
/// Either list is capped at `options.max_stations`.
#[instrument(skip(ingester, stations, options), fields(product = %target.product))]
pub async fn build_composite(
    ingester: Arc<RadarIngester>,
    stations: Option<Vec<String>>,
    target: DecodeTarget,
    options: &CompositeOptions,
) -> Result<Composite> {
    if options.concurrency == 0 {
        return Err(IngestionError::InvalidConfig(
            "composite concurrency must be > 0".to_string(),
        ));
    }

    let mut stations = match stations {
        Some(stations) => stations,
        None => ingester.repository().list_stations().await?,
    };
    if stations.is_empty() {
        return Err(IngestionError::NoStations);
    }
    stations.truncate(options.max_stations);
    info!(count = stations.len(), "Decoding stations for composite");

    let timeout = options.station_timeout();
    let results: Vec<(String, Option<RadarScan>)> = stream::iter(stations)
        .map(|station| {
            let ingester = Arc::clone(&ingester);
            async move {
                let task_station = station.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::timeout(timeout, ingester.latest_scan(&task_station, target)).await
                });

                let scan = match handle.await {
                    Ok(Ok(scan)) => scan,
                    Ok(Err(_)) => {
                        warn!(station = %station, "Station decode timed out");
                        record_scan_outcome(ScanOutcome::TimedOut, 0);
                        None
                    }
                    Err(e) => {
                        warn!(station = %station, error = %e, "Station decode task failed");
                        record_scan_outcome(ScanOutcome::Failed, 0);
                        None
                    }
                };
                (station, scan)
            }
        })
        .buffer_unordered(options.concurrency)
        .collect()
        .await;

    let mut scans = Vec::new();
    let mut contributed = Vec::new();
    let mut missing = Vec::new();
    for (station, scan) in results {
        match scan {
            Some(scan) if scan.has_data() => {
                contributed.push(station);
                scans.push(scan);
            }
            _ => missing.push(station),
        }
    }
    contributed.sort();
    missing.sort();

    let gates = merge_scans(&scans, target.product);
    info!(
        stations = contributed.len(),
        missing = missing.len(),
        gates = gates.len(),
        "Built composite"
    );

    Ok(Composite {
        product: target.product,
        tilt: target.tilt,
        generated_at: Utc::now(),
        stations: contributed,
        missing,
        gates,
    })
}

/// Merge the gates of several scans onto the composite grid.
///
/// A cell with one gate keeps it unchanged. A cell with several gets one
/// gate at their mean position, valued by [`blend_gates`].
pub fn merge_scans(scans: &[RadarScan], product: RadarProduct) -> Vec<RadarGate> {
    let mut cells: BTreeMap<(i64, i64), Vec<RadarGate>> = BTreeMap::new();
    for gate in scans.iter().flat_map(|scan| scan.gates.iter()) {
        cells.entry(cell_of(gate)).or_default().push(*gate);
    }

    cells
        .into_values()
        .filter_map(|gates| match gates.as_slice() {
            [single] => Some(*single),
            _ => blend_gates(&gates, product),
        })
        .collect()
}

/// Blend co-located gates into one.
///
/// Reflectivity keeps the strongest return. Other products take a mean
/// weighted by `1 / (0.1 + range_km)`. Blended gates carry zero azimuth,
/// range and elevation.
pub fn blend_gates(gates: &[RadarGate], product: RadarProduct) -> Option<RadarGate> {
    if gates.is_empty() {
        return None;
    }
    let n = gates.len() as f64;
    let latitude = gates.iter().map(|g| g.latitude).sum::<f64>() / n;
    let longitude = gates.iter().map(|g| g.longitude).sum::<f64>() / n;

    let value = if product.is_reflectivity() {
        gates
            .iter()
            .map(|g| g.value)
            .fold(f64::NEG_INFINITY, f64::max)
    } else {
        let (weighted, total) = gates.iter().fold((0.0, 0.0), |(weighted, total), g| {
            let w = 1.0 / (0.1 + g.range_km);
            (weighted + g.value * w, total + w)
        });
        weighted / total
    };

    Some(RadarGate {
        latitude,
        longitude,
        value,
        azimuth_deg: 0.0,
        range_km: 0.0,
        elevation_deg: 0.0,
    })
}

fn cell_of(gate: &RadarGate) -> (i64, i64) {
    (
        (gate.latitude * CELLS_PER_DEGREE).floor() as i64,
        (gate.longitude * CELLS_PER_DEGREE).floor() as i64,
    )
}
