//! Scan assembly across the chunks of one volume.
//!
//! [`ScanAssembler`] is a small state machine:
//!
//! ```text
//! AwaitingStart --decode_start_chunk--> ProcessingRemaining --finish--> Done
//!                                        |        ^
//!                                        +--------+ decode_chunk
//! ```
//!
//! The Start chunk must come first because it carries the station
//! reference every later gate is projected from. Chunk faults never leave
//! the assembler; a bad chunk just contributes fewer gates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk_key::{chunk_sort_number, ChunkIdentity};
use crate::decompress::decompress_blocks;
use crate::error::{DecodeError, Result};
use crate::framing::MessageFrames;
use crate::message31::{
    decode_radial, DecodeTarget, RadialOutcome, StationReference, VolumeDecodeContext,
};
use crate::observer::{DecodeObserver, DecodeSummary};
use crate::products::RadarProduct;
use crate::volume_header::{VolumeHeader, VOLUME_HEADER_SIZE};

/// One geolocated sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarGate {
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
    pub azimuth_deg: f64,
    pub range_km: f64,
    pub elevation_deg: f64,
}

/// All gates of one product and tilt decoded from a volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarScan {
    pub station_id: String,
    pub product: RadarProduct,
    /// Volume header time when present, otherwise the Start chunk key time
    pub timestamp: DateTime<Utc>,
    pub tilt: u8,
    pub station: Option<StationReference>,
    /// Elevation angle of the first radial decoded at this tilt
    pub elevation_angle: Option<f32>,
    /// Radials that contributed at least one gate
    pub radial_count: usize,
    pub volume_icao: Option<String>,
    pub gates: Vec<RadarGate>,
}

impl RadarScan {
    pub fn has_data(&self) -> bool {
        !self.gates.is_empty()
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    /// Minimum and maximum gate value, or `None` for an empty scan.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.gates.iter().fold(None, |acc, gate| match acc {
            None => Some((gate.value, gate.value)),
            Some((min, max)) => Some((min.min(gate.value), max.max(gate.value))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    AwaitingStart,
    ProcessingRemaining,
    Done,
}

/// Accumulates gates for one volume, chunk by chunk.
pub struct ScanAssembler<'o> {
    station_id: String,
    target: DecodeTarget,
    observer: &'o dyn DecodeObserver,
    state: AssemblerState,
    context: VolumeDecodeContext,
    timestamp: Option<DateTime<Utc>>,
    volume_icao: Option<String>,
    elevation_angle: Option<f32>,
    radial_count: usize,
    gates: Vec<RadarGate>,
    summary: DecodeSummary,
}

impl<'o> ScanAssembler<'o> {
    pub fn new(
        station_id: impl Into<String>,
        target: DecodeTarget,
        observer: &'o dyn DecodeObserver,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            target,
            observer,
            state: AssemblerState::AwaitingStart,
            context: VolumeDecodeContext::new(),
            timestamp: None,
            volume_icao: None,
            elevation_angle: None,
            radial_count: 0,
            gates: Vec::new(),
            summary: DecodeSummary::default(),
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn summary(&self) -> &DecodeSummary {
        &self.summary
    }

    pub fn target(&self) -> &DecodeTarget {
        &self.target
    }

    /// Decode the volume's Start chunk. Must be called exactly once, first.
    ///
    /// A leading volume header record is parsed and skipped. Returns the
    /// number of gates the chunk contributed.
    pub fn decode_start_chunk(&mut self, chunk: &ChunkIdentity, payload: &[u8]) -> Result<usize> {
        match self.state {
            AssemblerState::AwaitingStart => {}
            AssemblerState::ProcessingRemaining => return Err(DecodeError::StartChunkDecoded),
            AssemblerState::Done => return Err(DecodeError::ScanFinished),
        }
        if !chunk.is_start() {
            return Err(DecodeError::NotStartChunk(chunk.raw_key.clone()));
        }

        let mut body = payload;
        if VolumeHeader::is_present(payload) {
            if let Some(header) = VolumeHeader::parse(payload) {
                self.observer.volume_header(&header);
                self.timestamp = Some(header.timestamp);
                if !header.icao.is_empty() {
                    self.volume_icao = Some(header.icao);
                }
            }
            body = &payload[VOLUME_HEADER_SIZE..];
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(chunk.timestamp);
        }

        self.state = AssemblerState::ProcessingRemaining;
        Ok(self.decode_payload(chunk, body))
    }

    /// Decode a non-Start chunk. Returns the number of gates it contributed.
    pub fn decode_chunk(&mut self, chunk: &ChunkIdentity, payload: &[u8]) -> Result<usize> {
        match self.state {
            AssemblerState::AwaitingStart => Err(DecodeError::StartChunkPending),
            AssemblerState::ProcessingRemaining => Ok(self.decode_payload(chunk, payload)),
            AssemblerState::Done => Err(DecodeError::ScanFinished),
        }
    }

    /// Record that a chunk could not be fetched; it contributes nothing.
    pub fn skip_chunk(&mut self, chunk: &ChunkIdentity) {
        self.summary.chunks += 1;
        self.observer.chunk_decoded(chunk, 0);
    }

    /// Finalize the scan.
    ///
    /// Returns `None` if the Start chunk was never decoded. Any further
    /// decode call fails with [`DecodeError::ScanFinished`].
    pub fn finish(&mut self) -> Option<RadarScan> {
        let previous = std::mem::replace(&mut self.state, AssemblerState::Done);
        if previous != AssemblerState::ProcessingRemaining {
            return None;
        }

        Some(RadarScan {
            station_id: self.station_id.clone(),
            product: self.target.product,
            timestamp: self.timestamp?,
            tilt: self.target.tilt,
            station: self.context.station().copied(),
            elevation_angle: self.elevation_angle,
            radial_count: self.radial_count,
            volume_icao: self.volume_icao.take(),
            gates: std::mem::take(&mut self.gates),
        })
    }

    fn decode_payload(&mut self, chunk: &ChunkIdentity, payload: &[u8]) -> usize {
        let decompressed = decompress_blocks(payload, self.observer);
        self.summary.chunks += 1;
        self.summary.blocks += decompressed.blocks.len();
        self.summary.failed_blocks += decompressed.failed_blocks;
        if decompressed.is_truncated() {
            self.summary.truncated_chunks += 1;
        }

        let before = self.gates.len();
        for block in &decompressed.blocks {
            let mut frames = MessageFrames::new(block);
            for frame in frames.by_ref() {
                self.summary.messages += 1;
                if !frame.is_radial_data() {
                    self.observer.message_skipped(frame.message_type());
                    continue;
                }
                self.decode_frame(frame.body);
            }
            if let Some(error) = frames.stopped() {
                self.observer.framing_stopped(error);
            }
        }

        let added = self.gates.len() - before;
        self.observer.chunk_decoded(chunk, added);
        added
    }

    fn decode_frame(&mut self, body: &[u8]) {
        match decode_radial(body, &self.target, &mut self.context, self.observer) {
            Ok(RadialOutcome::OtherTilt(_)) => self.summary.radials_filtered += 1,
            Ok(RadialOutcome::Decoded { header, gates }) => {
                self.summary.radials_decoded += 1;
                self.elevation_angle.get_or_insert(header.elevation_angle);
                if !gates.is_empty() {
                    self.radial_count += 1;
                    self.summary.gates += gates.len();
                    self.gates.extend(gates);
                }
            }
            Err(error) => {
                self.observer.radial_skipped(&error);
                self.summary.radials_skipped += 1;
            }
        }
    }
}

/// Decode an in-memory volume.
///
/// The first Start chunk (by chunk number) is decoded first, then every
/// other chunk in ascending chunk number. Returns `None` when there is no
/// Start chunk.
pub fn assemble_volume<B: AsRef<[u8]>>(
    chunks: &[(ChunkIdentity, B)],
    target: DecodeTarget,
    observer: &dyn DecodeObserver,
) -> Option<RadarScan> {
    let mut ordered: Vec<&(ChunkIdentity, B)> = chunks.iter().collect();
    ordered.sort_by_key(|(identity, _)| chunk_sort_number(&identity.raw_key));

    let start_index = ordered.iter().position(|(identity, _)| identity.is_start())?;
    let (start, start_bytes) = ordered[start_index];

    let mut assembler = ScanAssembler::new(start.site.clone(), target, observer);
    assembler.decode_start_chunk(start, start_bytes.as_ref()).ok()?;

    for (index, (identity, bytes)) in ordered.iter().enumerate() {
        if index == start_index {
            continue;
        }
        if assembler.decode_chunk(identity, bytes.as_ref()).is_err() {
            break;
        }
    }

    assembler.finish()
}
