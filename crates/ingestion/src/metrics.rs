//! Decode and scan metrics.
//!
//! Counters go through the `metrics` facade; with no recorder installed
//! they are no-ops.

use level2_parser::{
    ChunkIdentity, DecodeError, DecodeObserver, KeyParseError, StationReference, TracingObserver,
    VolumeHeader,
};
use ::metrics::{counter, histogram};

/// Outcome label for `radar_scans_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Decoded,
    NoVolume,
    NoStartChunk,
    TimedOut,
    Failed,
}

impl ScanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutcome::Decoded => "decoded",
            ScanOutcome::NoVolume => "no_volume",
            ScanOutcome::NoStartChunk => "no_start_chunk",
            ScanOutcome::TimedOut => "timed_out",
            ScanOutcome::Failed => "failed",
        }
    }
}

/// Record one per-station scan attempt.
pub fn record_scan_outcome(outcome: ScanOutcome, gates: usize) {
    counter!("radar_scans_total", "outcome" => outcome.as_str()).increment(1);
    if outcome == ScanOutcome::Decoded {
        histogram!("radar_scan_gates").record(gates as f64);
    }
}

/// Counts decode events, then hands them to an inner observer.
#[derive(Debug, Default, Clone)]
pub struct MetricsObserver<O = TracingObserver> {
    inner: O,
}

impl<O: DecodeObserver> MetricsObserver<O> {
    pub fn new(inner: O) -> Self {
        Self { inner }
    }
}

impl<O: DecodeObserver> DecodeObserver for MetricsObserver<O> {
    fn key_rejected(&self, key: &str, error: &KeyParseError) {
        counter!("level2_keys_rejected_total").increment(1);
        self.inner.key_rejected(key, error);
    }

    fn volume_selected(&self, site: &str, volume_number: &str, chunks: usize, rejected: usize) {
        self.inner.volume_selected(site, volume_number, chunks, rejected);
    }

    fn volume_header(&self, header: &VolumeHeader) {
        self.inner.volume_header(header);
    }

    fn block_decompressed(&self, index: usize, compressed: usize, decompressed: usize) {
        counter!("level2_blocks_decompressed_total").increment(1);
        self.inner.block_decompressed(index, compressed, decompressed);
    }

    fn block_failed(&self, index: usize, error: &DecodeError) {
        counter!("level2_blocks_failed_total").increment(1);
        self.inner.block_failed(index, error);
    }

    fn chunk_truncated(&self, error: &DecodeError) {
        counter!("level2_chunks_truncated_total").increment(1);
        self.inner.chunk_truncated(error);
    }

    fn message_skipped(&self, message_type: u8) {
        self.inner.message_skipped(message_type);
    }

    fn framing_stopped(&self, error: &DecodeError) {
        self.inner.framing_stopped(error);
    }

    fn station_reference(&self, station: &StationReference) {
        self.inner.station_reference(station);
    }

    fn radial_decoded(&self, azimuth: f32, elevation_number: u8, gates: usize) {
        counter!("level2_radials_decoded_total").increment(1);
        counter!("level2_gates_decoded_total").increment(gates as u64);
        self.inner.radial_decoded(azimuth, elevation_number, gates);
    }

    fn radial_skipped(&self, error: &DecodeError) {
        counter!("level2_radials_skipped_total").increment(1);
        self.inner.radial_skipped(error);
    }

    fn chunk_decoded(&self, chunk: &ChunkIdentity, gates: usize) {
        self.inner.chunk_decoded(chunk, gates);
    }
}
