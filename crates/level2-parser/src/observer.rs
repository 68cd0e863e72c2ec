//! Decode event reporting.
//!
//! The decoder recovers from every fault it meets and keeps going. Instead of
//! logging from deep inside the parser, each stage reports what happened to a
//! [`DecodeObserver`] supplied by the caller.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunk_key::ChunkIdentity;
use crate::error::{DecodeError, KeyParseError};
use crate::message31::StationReference;
use crate::volume_header::VolumeHeader;

/// Receives decode events. All methods default to doing nothing.
pub trait DecodeObserver: Send + Sync {
    fn key_rejected(&self, _key: &str, _error: &KeyParseError) {}

    fn volume_selected(&self, _site: &str, _volume_number: &str, _chunks: usize, _rejected: usize) {}

    fn volume_header(&self, _header: &VolumeHeader) {}

    fn block_decompressed(&self, _index: usize, _compressed: usize, _decompressed: usize) {}

    fn block_failed(&self, _index: usize, _error: &DecodeError) {}

    /// A chunk stopped early at a bad control word or size.
    fn chunk_truncated(&self, _error: &DecodeError) {}

    fn message_skipped(&self, _message_type: u8) {}

    fn framing_stopped(&self, _error: &DecodeError) {}

    fn station_reference(&self, _station: &StationReference) {}

    fn radial_decoded(&self, _azimuth: f32, _elevation_number: u8, _gates: usize) {}

    fn radial_skipped(&self, _error: &DecodeError) {}

    fn chunk_decoded(&self, _chunk: &ChunkIdentity, _gates: usize) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DecodeObserver for NoopObserver {}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DecodeObserver for TracingObserver {
    fn key_rejected(&self, key: &str, error: &KeyParseError) {
        debug!(key = %key, error = %error, "Skipping unparseable chunk key");
    }

    fn volume_selected(&self, site: &str, volume_number: &str, chunks: usize, rejected: usize) {
        info!(
            site = %site,
            volume = %volume_number,
            chunks,
            rejected_keys = rejected,
            "Selected latest volume"
        );
    }

    fn volume_header(&self, header: &VolumeHeader) {
        debug!(
            tape = %header.tape_name,
            icao = %header.icao,
            timestamp = %header.timestamp,
            "Parsed volume header record"
        );
    }

    fn block_decompressed(&self, index: usize, compressed: usize, decompressed: usize) {
        debug!(block = index, compressed, decompressed, "Decompressed block");
    }

    fn block_failed(&self, index: usize, error: &DecodeError) {
        warn!(block = index, error = %error, "Skipping block");
    }

    fn chunk_truncated(&self, error: &DecodeError) {
        warn!(error = %error, "Chunk ended early");
    }

    fn message_skipped(&self, message_type: u8) {
        tracing::trace!(message_type, "Skipping message");
    }

    fn framing_stopped(&self, error: &DecodeError) {
        debug!(error = %error, "Stopped framing buffer");
    }

    fn station_reference(&self, station: &StationReference) {
        info!(
            lat = station.latitude,
            lon = station.longitude,
            alt_m = station.altitude_meters,
            "Captured station reference"
        );
    }

    fn radial_decoded(&self, azimuth: f32, elevation_number: u8, gates: usize) {
        tracing::trace!(azimuth, elevation_number, gates, "Decoded radial");
    }

    fn radial_skipped(&self, error: &DecodeError) {
        warn!(error = %error, "Radial produced no gates");
    }

    fn chunk_decoded(&self, chunk: &ChunkIdentity, gates: usize) {
        debug!(chunk = %chunk, gates, "Decoded chunk");
    }
}

/// Per-scan decode counters.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeSummary {
    pub chunks: usize,
    pub truncated_chunks: usize,
    pub blocks: usize,
    pub failed_blocks: usize,
    pub messages: usize,
    pub radials_decoded: usize,
    pub radials_skipped: usize,
    pub radials_filtered: usize,
    pub gates: usize,
}

impl DecodeSummary {
    pub fn merge(&mut self, other: &DecodeSummary) {
        self.chunks += other.chunks;
        self.truncated_chunks += other.truncated_chunks;
        self.blocks += other.blocks;
        self.failed_blocks += other.failed_blocks;
        self.messages += other.messages;
        self.radials_decoded += other.radials_decoded;
        self.radials_skipped += other.radials_skipped;
        self.radials_filtered += other.radials_filtered;
        self.gates += other.gates;
    }
}
