//! Message 31 (digital radar data) decoding.
//!
//! A radial body is read front to back:
//!
//! 1. 52-byte data header block
//! 2. `block_count` data blocks, each introduced by a 1-byte type and a
//!    3-byte name:
//!    - `V` + `VOL`: 31-byte constant block holding the station position
//!    - anything else: 4 reserved bytes, an 18-byte moment header, then
//!      `gate_count` samples of `data_size_bits` each
//!
//! Big-endian integers throughout; angles, scale/offset and the station
//! position are little-endian floats.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};
use crate::geo;
use crate::observer::DecodeObserver;
use crate::products::RadarProduct;
use crate::scan::RadarGate;

pub const DATA_HEADER_SIZE: usize = 52;
pub const VOLUME_BLOCK_SIZE: usize = 31;
/// Gate geometry, word size, scale and offset; offset ends at byte 18.
pub const MOMENT_HEADER_SIZE: usize = 18;
const BLOCK_ID_SIZE: usize = 4;
const MOMENT_RESERVED_SIZE: usize = 4;

/// Raw sample below the signal threshold.
pub const BELOW_THRESHOLD: u16 = 0;
/// Raw sample flagged as range folded.
pub const RANGE_FOLDED: u16 = 1;

/// Which product and sweep to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeTarget {
    pub product: RadarProduct,
    /// Elevation number of the sweep to keep
    pub tilt: u8,
}

impl DecodeTarget {
    pub fn new(product: RadarProduct, tilt: u8) -> Self {
        Self { product, tilt }
    }
}

/// Data header block (first 52 bytes of the radial body).
#[derive(Debug, Clone, PartialEq)]
pub struct DataHeader {
    pub station_id: String,
    pub azimuth_number: u16,
    /// Degrees, 0-360
    pub azimuth_angle: f32,
    pub elevation_number: u8,
    /// Degrees
    pub elevation_angle: f32,
    pub block_count: u16,
}

impl DataHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < DATA_HEADER_SIZE {
            return Err(DecodeError::RadialHeaderTruncated {
                available: data.len(),
            });
        }

        Ok(Self {
            station_id: String::from_utf8_lossy(&data[0..4]).into_owned(),
            azimuth_number: u16::from_be_bytes([data[10], data[11]]),
            azimuth_angle: f32::from_le_bytes([data[12], data[13], data[14], data[15]]),
            elevation_number: data[26],
            elevation_angle: f32::from_le_bytes([data[28], data[29], data[30], data[31]]),
            block_count: u16::from_be_bytes([data[50], data[51]]),
        })
    }
}

/// Radar site position from the volume constant block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationReference {
    pub latitude: f32,
    pub longitude: f32,
    pub altitude_meters: i16,
}

impl StationReference {
    /// Parse from the 31-byte body following the `VVOL` block id.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() < VOLUME_BLOCK_SIZE {
            return None;
        }
        Some(Self {
            latitude: f32::from_le_bytes([body[4], body[5], body[6], body[7]]),
            longitude: f32::from_le_bytes([body[8], body[9], body[10], body[11]]),
            altitude_meters: i16::from_le_bytes([body[12], body[13]]),
        })
    }
}

/// State shared by every radial of one volume decode.
///
/// The station reference is set by the first volume block seen and is
/// read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct VolumeDecodeContext {
    station: Option<StationReference>,
}

impl VolumeDecodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn station(&self) -> Option<&StationReference> {
        self.station.as_ref()
    }

    /// Record the station reference unless one is already known.
    /// Returns true when this call set it.
    pub fn capture_station(&mut self, station: StationReference) -> bool {
        if self.station.is_some() {
            return false;
        }
        self.station = Some(station);
        true
    }
}

/// Moment data block header (follows the reserved bytes).
#[derive(Debug, Clone, PartialEq)]
pub struct MomentHeader {
    pub name: String,
    pub gate_count: u16,
    pub range_to_first_gate_m: u16,
    pub gate_spacing_m: u16,
    pub data_size_bits: u8,
    pub scale: f32,
    pub offset: f32,
}

impl MomentHeader {
    pub fn parse(name: &str, data: &[u8]) -> Option<Self> {
        if data.len() < MOMENT_HEADER_SIZE {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            gate_count: u16::from_be_bytes([data[0], data[1]]),
            range_to_first_gate_m: u16::from_be_bytes([data[2], data[3]]),
            gate_spacing_m: u16::from_be_bytes([data[4], data[5]]),
            data_size_bits: data[9],
            scale: f32::from_le_bytes([data[10], data[11], data[12], data[13]]),
            offset: f32::from_le_bytes([data[14], data[15], data[16], data[17]]),
        })
    }

    /// Bytes per raw sample.
    pub fn bytes_per_gate(&self) -> Result<usize> {
        match self.data_size_bits {
            8 => Ok(1),
            16 => Ok(2),
            bits => Err(DecodeError::UnsupportedWordSize {
                name: self.name.clone(),
                bits,
            }),
        }
    }

    /// Length of the sample array that follows the header.
    pub fn data_len(&self) -> Result<usize> {
        Ok(self.gate_count as usize * self.bytes_per_gate()?)
    }

    /// Range to the centre of gate `index` in kilometres.
    pub fn range_km(&self, index: usize) -> f64 {
        (self.range_to_first_gate_m as f64 + index as f64 * self.gate_spacing_m as f64) / 1000.0
    }

    /// Physical value of a raw sample, or `None` for the threshold and
    /// range-folded sentinels.
    pub fn physical_value(&self, raw: u16) -> Option<f64> {
        if raw <= RANGE_FOLDED {
            return None;
        }
        Some((raw as f64 + self.offset as f64) / self.scale as f64)
    }
}

/// What a radial contributed.
#[derive(Debug, Clone, PartialEq)]
pub enum RadialOutcome {
    /// Belongs to another sweep; nothing past the data header was read
    OtherTilt(DataHeader),
    Decoded {
        header: DataHeader,
        gates: Vec<RadarGate>,
    },
}

impl RadialOutcome {
    pub fn header(&self) -> &DataHeader {
        match self {
            RadialOutcome::OtherTilt(header) => header,
            RadialOutcome::Decoded { header, .. } => header,
        }
    }

    pub fn gate_count(&self) -> usize {
        match self {
            RadialOutcome::OtherTilt(_) => 0,
            RadialOutcome::Decoded { gates, .. } => gates.len(),
        }
    }
}

/// Decode one radial body (message header already consumed).
///
/// Gates are only returned if the whole radial decodes; an error anywhere
/// means this radial contributes nothing. A volume block read before the
/// error still updates `context`.
pub fn decode_radial(
    body: &[u8],
    target: &DecodeTarget,
    context: &mut VolumeDecodeContext,
    observer: &dyn DecodeObserver,
) -> Result<RadialOutcome> {
    let header = DataHeader::parse(body)?;
    if header.elevation_number != target.tilt {
        return Ok(RadialOutcome::OtherTilt(header));
    }

    let mut cursor = &body[DATA_HEADER_SIZE..];
    let mut gates = Vec::new();

    for index in 0..header.block_count {
        let id = take(&mut cursor, BLOCK_ID_SIZE, index, "block id")?;
        let block_type = id[0];
        let name = String::from_utf8_lossy(&id[1..4]).into_owned();

        if block_type == b'V' && name == "VOL" {
            let vol = take(&mut cursor, VOLUME_BLOCK_SIZE, index, "volume block")?;
            if let Some(station) = StationReference::parse(vol) {
                if context.capture_station(station) {
                    observer.station_reference(&station);
                }
            }
            continue;
        }

        take(&mut cursor, MOMENT_RESERVED_SIZE, index, "reserved bytes")?;
        let raw_header = take(&mut cursor, MOMENT_HEADER_SIZE, index, "moment header")?;
        let moment = MomentHeader::parse(&name, raw_header).ok_or(
            DecodeError::DataBlockTruncated {
                index,
                what: "moment header",
                needed: MOMENT_HEADER_SIZE,
                available: raw_header.len(),
            },
        )?;

        let data_len = moment.data_len()?;
        let samples = take(&mut cursor, data_len, index, "moment data")?;

        if !target.product.matches_block(&moment.name) {
            continue;
        }

        decode_moment(&moment, samples, &header, context, &mut gates)?;
    }

    observer.radial_decoded(header.azimuth_angle, header.elevation_number, gates.len());
    Ok(RadialOutcome::Decoded { header, gates })
}

/// Append the valid gates of one moment block.
fn decode_moment(
    moment: &MomentHeader,
    samples: &[u8],
    header: &DataHeader,
    context: &VolumeDecodeContext,
    gates: &mut Vec<RadarGate>,
) -> Result<()> {
    if moment.scale == 0.0 {
        return Err(DecodeError::InvalidScale {
            name: moment.name.clone(),
        });
    }
    let station = context
        .station()
        .ok_or_else(|| DecodeError::MissingStationReference {
            name: moment.name.clone(),
        })?;

    let width = moment.bytes_per_gate()?;
    let azimuth = header.azimuth_angle as f64;
    let elevation = header.elevation_angle as f64;

    for (index, word) in samples.chunks_exact(width).enumerate() {
        let raw = match word {
            [b] => *b as u16,
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            _ => continue,
        };
        let Some(value) = moment.physical_value(raw) else {
            continue;
        };

        let range_km = moment.range_km(index);
        let (latitude, longitude) = geo::project(
            station.latitude as f64,
            station.longitude as f64,
            range_km,
            azimuth,
        );

        gates.push(RadarGate {
            latitude,
            longitude,
            value,
            azimuth_deg: azimuth,
            range_km,
            elevation_deg: elevation,
        });
    }

    Ok(())
}

/// Split `n` bytes off the front of `cursor`.
fn take<'a>(cursor: &mut &'a [u8], n: usize, index: u16, what: &'static str) -> Result<&'a [u8]> {
    if cursor.len() < n {
        return Err(DecodeError::DataBlockTruncated {
            index,
            what,
            needed: n,
            available: cursor.len(),
        });
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}
