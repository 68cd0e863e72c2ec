//! NEXRAD Level II chunk decoder.
//!
//! Turns the chunked volumes published to the Level II chunks bucket into
//! geolocated radar gates. The pipeline runs strictly forward:
//!
//! - [`chunk_key`] parses object keys into [`ChunkIdentity`] values
//! - [`volume`] groups listings into volumes and picks the latest one
//! - [`decompress`] splits a chunk payload into bzip2 blocks
//! - [`framing`] walks the decompressed message stream
//! - [`message31`] decodes radial data into gates
//! - [`geo`] projects (range, azimuth) onto the earth
//! - [`scan`] drives all of the above for one volume
//!
//! Nothing in this crate performs I/O; fetching chunk bytes is the caller's job.

pub mod chunk_key;
pub mod decompress;
pub mod error;
pub mod framing;
pub mod geo;
pub mod message31;
pub mod observer;
pub mod products;
pub mod scan;
pub mod volume;
pub mod volume_header;

pub use chunk_key::{ChunkIdentity, ChunkType};
pub use decompress::{decompress_blocks, DecompressedChunk};
pub use error::{DecodeError, KeyParseError, Result};
pub use framing::{MessageFrame, MessageFrames, MessageHeader, RADIAL_DATA_MESSAGE};
pub use geo::project;
pub use message31::{
    decode_radial, DataHeader, DecodeTarget, MomentHeader, RadialOutcome, StationReference,
    VolumeDecodeContext,
};
pub use observer::{DecodeObserver, DecodeSummary, NoopObserver, TracingObserver};
pub use products::RadarProduct;
pub use scan::{assemble_volume, AssemblerState, RadarGate, RadarScan, ScanAssembler};
pub use volume::{group_volumes, select_latest_volume, ChunkListing, Volume};
pub use volume_header::VolumeHeader;
