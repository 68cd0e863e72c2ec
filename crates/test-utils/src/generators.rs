//! Byte builders for synthetic Level II data.
//!
//! The layouts here mirror what the decoder reads, so a test can describe a
//! radial in a few lines and get real bzip2-compressed chunk bytes back.

use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression;

/// Size of the channel terminal manager prefix before each message header.
pub const CTM_SIZE: usize = 12;
/// Size of the message header.
pub const MESSAGE_HEADER_SIZE: usize = 16;
/// Size of the Message 31 data header block.
pub const DATA_HEADER_SIZE: usize = 52;

/// Compresses `data` as a single bzip2 stream.
///
/// # Panics
///
/// Panics if the encoder fails, which only happens on allocation failure.
pub fn compress_block(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).expect("bzip2 write");
    encoder.finish().expect("bzip2 finish")
}

/// Compresses `data` and prefixes it with a big-endian i32 control word.
///
/// When `negative` is set the control word carries the negated size, as
/// the last block of a real record does.
pub fn control_word_block(data: &[u8], negative: bool) -> Vec<u8> {
    let compressed = compress_block(data);
    let size = compressed.len() as i32;
    let control = if negative { -size } else { size };

    let mut out = Vec::with_capacity(4 + compressed.len());
    out.extend_from_slice(&control.to_be_bytes());
    out.extend(compressed);
    out
}

/// Wraps `body` in a zeroed CTM prefix and a message header of `message_type`.
///
/// Odd-length bodies are padded with one zero byte so the half-word size
/// is exact.
pub fn frame_message(message_type: u8, body: &[u8]) -> Vec<u8> {
    let mut padded = body.to_vec();
    if padded.len() % 2 != 0 {
        padded.push(0);
    }
    let halfwords = ((MESSAGE_HEADER_SIZE + padded.len()) / 2) as u16;

    let mut out = vec![0u8; CTM_SIZE];
    out.extend_from_slice(&halfwords.to_be_bytes());
    out.push(0); // redundant channel
    out.push(message_type);
    out.extend_from_slice(&1u16.to_be_bytes()); // sequence
    out.extend_from_slice(&19841u16.to_be_bytes()); // julian date
    out.extend_from_slice(&0u32.to_be_bytes()); // ms of day
    out.extend_from_slice(&1u16.to_be_bytes()); // segment count
    out.extend_from_slice(&1u16.to_be_bytes()); // segment number
    out.extend(padded);
    out
}

/// A chunk payload holding `messages` in one compressed block.
pub fn chunk_payload(messages: &[Vec<u8>]) -> Vec<u8> {
    control_word_block(&messages.concat(), false)
}

/// A chunk payload with one compressed block per entry of `blocks`.
pub fn multi_block_payload(blocks: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, messages) in blocks.iter().enumerate() {
        out.extend(control_word_block(&messages.concat(), i + 1 == blocks.len()));
    }
    out
}

/// The 24-byte volume header record that opens a Start chunk.
pub fn volume_header_record(julian_date: u32, millis: u32, icao: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(b"AR2V0006.");
    out.extend_from_slice(b"585");
    out.extend_from_slice(&julian_date.to_be_bytes());
    out.extend_from_slice(&millis.to_be_bytes());
    out.extend_from_slice(&padded_ascii(icao, 4));
    out
}

/// A generic moment data block.
#[derive(Debug, Clone)]
pub struct MomentSpec {
    pub name: String,
    pub range_to_first_gate_m: u16,
    pub gate_spacing_m: u16,
    pub data_size_bits: u8,
    pub scale: f32,
    pub offset: f32,
    pub raw: Vec<u16>,
}

impl MomentSpec {
    /// 8-bit samples, scale 1, offset 0, first gate at 1000 m, 250 m spacing.
    pub fn new(name: &str, raw: &[u16]) -> Self {
        Self {
            name: name.to_string(),
            range_to_first_gate_m: 1000,
            gate_spacing_m: 250,
            data_size_bits: 8,
            scale: 1.0,
            offset: 0.0,
            raw: raw.to_vec(),
        }
    }

    pub fn scale(mut self, scale: f32, offset: f32) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    pub fn bits(mut self, bits: u8) -> Self {
        self.data_size_bits = bits;
        self
    }

    pub fn geometry(mut self, first_gate_m: u16, spacing_m: u16) -> Self {
        self.range_to_first_gate_m = first_gate_m;
        self.gate_spacing_m = spacing_m;
        self
    }

    /// Block id, reserved bytes, moment header and samples.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(b'D');
        out.extend_from_slice(&padded_ascii(&self.name, 3));
        out.extend_from_slice(&[0u8; 4]);

        let mut header = [0u8; 18];
        header[0..2].copy_from_slice(&(self.raw.len() as u16).to_be_bytes());
        header[2..4].copy_from_slice(&self.range_to_first_gate_m.to_be_bytes());
        header[4..6].copy_from_slice(&self.gate_spacing_m.to_be_bytes());
        header[9] = self.data_size_bits;
        header[10..14].copy_from_slice(&self.scale.to_le_bytes());
        header[14..18].copy_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&header);

        for raw in &self.raw {
            if self.data_size_bits == 8 {
                out.push(*raw as u8);
            } else {
                out.extend_from_slice(&raw.to_be_bytes());
            }
        }
        out
    }
}

/// The `VVOL` constant block carrying the station position.
pub fn volume_block(latitude: f32, longitude: f32, altitude_m: i16) -> Vec<u8> {
    let mut out = b"VVOL".to_vec();
    let mut body = [0u8; 31];
    body[0..2].copy_from_slice(&44u16.to_be_bytes()); // block size
    body[4..8].copy_from_slice(&latitude.to_le_bytes());
    body[8..12].copy_from_slice(&longitude.to_le_bytes());
    body[12..14].copy_from_slice(&altitude_m.to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Builds a Message 31 radial body.
///
/// # Example
///
/// ```
/// use test_utils::{MomentSpec, RadialBuilder};
///
/// let body = RadialBuilder::new(90.0, 0)
///     .volume_block(32.5, -97.3, 208)
///     .moment(MomentSpec::new("REF", &[0, 1, 10, 20]).scale(2.0, 0.0))
///     .build();
/// assert_eq!(&body[0..4], b"KTLX");
/// ```
#[derive(Debug, Clone)]
pub struct RadialBuilder {
    station_id: String,
    azimuth_number: u16,
    azimuth_angle: f32,
    elevation_number: u8,
    elevation_angle: f32,
    block_count: Option<u16>,
    blocks: Vec<Vec<u8>>,
}

impl RadialBuilder {
    pub fn new(azimuth_angle: f32, elevation_number: u8) -> Self {
        Self {
            station_id: "KTLX".to_string(),
            azimuth_number: 1,
            azimuth_angle,
            elevation_number,
            elevation_angle: 0.5,
            block_count: None,
            blocks: Vec::new(),
        }
    }

    pub fn station_id(mut self, id: &str) -> Self {
        self.station_id = id.to_string();
        self
    }

    pub fn azimuth_number(mut self, number: u16) -> Self {
        self.azimuth_number = number;
        self
    }

    pub fn elevation_angle(mut self, degrees: f32) -> Self {
        self.elevation_angle = degrees;
        self
    }

    pub fn volume_block(mut self, latitude: f32, longitude: f32, altitude_m: i16) -> Self {
        self.blocks.push(volume_block(latitude, longitude, altitude_m));
        self
    }

    pub fn moment(mut self, moment: MomentSpec) -> Self {
        self.blocks.push(moment.encode());
        self
    }

    /// Appends arbitrary bytes as a block.
    pub fn raw_block(mut self, bytes: Vec<u8>) -> Self {
        self.blocks.push(bytes);
        self
    }

    /// Overrides the declared block count (defaults to the blocks added).
    pub fn declared_blocks(mut self, count: u16) -> Self {
        self.block_count = Some(count);
        self
    }

    /// The radial body: data header followed by its blocks.
    pub fn build(&self) -> Vec<u8> {
        let count = self.block_count.unwrap_or(self.blocks.len() as u16);

        let mut header = [0u8; DATA_HEADER_SIZE];
        header[0..4].copy_from_slice(&padded_ascii(&self.station_id, 4));
        header[10..12].copy_from_slice(&self.azimuth_number.to_be_bytes());
        header[12..16].copy_from_slice(&self.azimuth_angle.to_le_bytes());
        header[26] = self.elevation_number;
        header[28..32].copy_from_slice(&self.elevation_angle.to_le_bytes());
        header[50..52].copy_from_slice(&count.to_be_bytes());

        let mut out = header.to_vec();
        for block in &self.blocks {
            out.extend_from_slice(block);
        }
        out
    }

    /// The radial framed as a type 31 message.
    pub fn message(&self) -> Vec<u8> {
        frame_message(31, &self.build())
    }
}

fn padded_ascii(value: &str, len: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = value.bytes().take(len).collect();
    bytes.resize(len, b' ');
    bytes
}
