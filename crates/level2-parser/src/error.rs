//! Error types for Level II decoding.
//!
//! Every variant here is recovered locally by the stage that observes it;
//! callers see them through [`crate::DecodeObserver`] or as the reason a
//! stage stopped early.

use thiserror::Error;

/// Result type alias using DecodeError.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Malformed chunk key. The chunk is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("expected 3 '/'-delimited segments, got {0}")]
    SegmentCount(usize),

    #[error("empty {0} segment")]
    EmptySegment(&'static str),

    #[error("expected 4 '-'-delimited trailer fields, got {0}")]
    TrailerFieldCount(usize),

    #[error("invalid timestamp '{date}-{time}'")]
    InvalidTimestamp { date: String, time: String },

    #[error("invalid chunk number '{0}'")]
    InvalidChunkNumber(String),

    #[error("invalid chunk type '{0}' (expected S, I or E)")]
    InvalidChunkType(String),
}

/// Errors raised while turning chunk bytes into gates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("no volume could be assembled from the listing")]
    NoValidVolume,

    #[error("volume has no start chunk")]
    NoStartChunk,

    #[error("invalid compressed block size {size} ({remaining} bytes remaining)")]
    BlockSize { size: u32, remaining: usize },

    #[error("truncated control word ({remaining} bytes remaining)")]
    ControlWordTruncated { remaining: usize },

    #[error("block decompression failed: {0}")]
    Decompression(String),

    #[error("message header truncated ({remaining} bytes remaining)")]
    MessageHeaderTruncated { remaining: usize },

    #[error("radial data header truncated (got {available} of 52 bytes)")]
    RadialHeaderTruncated { available: usize },

    #[error("data block {index} truncated reading {what} (need {needed}, have {available})")]
    DataBlockTruncated {
        index: u16,
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("moment '{name}' declares unsupported word size of {bits} bits")]
    UnsupportedWordSize { name: String, bits: u8 },

    #[error("moment '{name}' declares zero scale")]
    InvalidScale { name: String },

    #[error("moment '{name}' decoded before any station reference")]
    MissingStationReference { name: String },

    #[error("chunk {0} is not a start chunk")]
    NotStartChunk(String),

    #[error("start chunk has not been decoded yet")]
    StartChunkPending,

    #[error("start chunk already decoded")]
    StartChunkDecoded,

    #[error("scan already finalized")]
    ScanFinished,
}
