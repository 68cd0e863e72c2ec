//! Per-station scan ingestion.

use std::sync::Arc;

use level2_parser::{
    select_latest_volume, DecodeObserver, DecodeSummary, DecodeTarget, RadarScan, ScanAssembler,
    TracingObserver, Volume,
};
use storage::ChunkRepository;
use tracing::{info, instrument, warn};

use crate::metrics::{record_scan_outcome, ScanOutcome};

/// A decoded scan with the counters gathered while decoding it.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scan: RadarScan,
    pub summary: DecodeSummary,
    pub volume_number: String,
    pub volume_complete: bool,
}

/// Decodes the latest volume of a station from a chunk repository.
///
/// Repository failures never escape: a failed listing reads as an empty
/// station, a failed Start chunk fetch as no scan, and any other failed
/// fetch as a chunk with no gates.
pub struct RadarIngester {
    repository: Arc<dyn ChunkRepository>,
    observer: Arc<dyn DecodeObserver>,
}

impl RadarIngester {
    pub fn new(repository: Arc<dyn ChunkRepository>) -> Self {
        Self {
            repository,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DecodeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn repository(&self) -> &Arc<dyn ChunkRepository> {
        &self.repository
    }

    /// The most recently modified volume for `station`, if any chunk key parses.
    #[instrument(skip(self))]
    pub async fn latest_volume(&self, station: &str) -> Option<Volume> {
        let listings = match self.repository.list_chunks(station).await {
            Ok(listings) => listings,
            Err(e) => {
                warn!(error = %e, "Chunk listing failed, treating station as empty");
                Vec::new()
            }
        };

        select_latest_volume(&listings, self.observer.as_ref())
    }

    /// Decode `target` from the latest volume of `station`.
    pub async fn latest_scan(&self, station: &str, target: DecodeTarget) -> Option<RadarScan> {
        self.latest_scan_report(station, target)
            .await
            .map(|report| report.scan)
    }

    /// Like [`latest_scan`](Self::latest_scan), keeping the decode summary.
    #[instrument(skip(self), fields(product = %target.product, tilt = target.tilt))]
    pub async fn latest_scan_report(
        &self,
        station: &str,
        target: DecodeTarget,
    ) -> Option<ScanReport> {
        let Some(volume) = self.latest_volume(station).await else {
            info!("No volume available");
            record_scan_outcome(ScanOutcome::NoVolume, 0);
            return None;
        };

        let report = self.decode_volume(station, &volume, target).await;
        match &report {
            Some(report) => {
                info!(
                    volume = %report.volume_number,
                    chunks = report.summary.chunks,
                    radials = report.scan.radial_count,
                    gates = report.scan.gate_count(),
                    "Decoded scan"
                );
                record_scan_outcome(ScanOutcome::Decoded, report.scan.gate_count());
            }
            None => record_scan_outcome(ScanOutcome::NoStartChunk, 0),
        }
        report
    }

    /// Fetch and decode every chunk of `volume`, Start chunk first.
    pub async fn decode_volume(
        &self,
        station: &str,
        volume: &Volume,
        target: DecodeTarget,
    ) -> Option<ScanReport> {
        let Some(start) = volume.start_chunk() else {
            warn!(volume = %volume.volume_number, "Volume has no start chunk");
            return None;
        };

        let start_bytes = match self.repository.fetch_chunk(&start.identity.raw_key).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                warn!(key = %start.identity.raw_key, "Start chunk is empty");
                return None;
            }
            Err(e) => {
                warn!(key = %start.identity.raw_key, error = %e, "Start chunk fetch failed");
                return None;
            }
        };

        let mut assembler = ScanAssembler::new(station, target, self.observer.as_ref());
        if let Err(e) = assembler.decode_start_chunk(&start.identity, &start_bytes) {
            warn!(error = %e, "Start chunk rejected");
            return None;
        }

        for chunk in volume.remaining_chunks() {
            let bytes = match self.repository.fetch_chunk(&chunk.identity.raw_key).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(key = %chunk.identity.raw_key, error = %e, "Chunk fetch failed, skipping");
                    assembler.skip_chunk(&chunk.identity);
                    continue;
                }
            };
            if let Err(e) = assembler.decode_chunk(&chunk.identity, &bytes) {
                warn!(error = %e, "Stopping volume decode");
                break;
            }
        }

        let scan = assembler.finish()?;
        Some(ScanReport {
            scan,
            summary: assembler.summary().clone(),
            volume_number: volume.volume_number.clone(),
            volume_complete: volume.is_complete(),
        })
    }
}
