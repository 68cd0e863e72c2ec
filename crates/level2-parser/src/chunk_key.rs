//! Chunk key parsing.
//!
//! Keys in the chunks bucket look like
//! `KTLX/585/20240427-231512-001-S`: site, volume number, then a trailer of
//! date, time, chunk number and chunk type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KeyParseError;

/// Position of a chunk within its volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkType {
    /// First chunk of a volume; carries the volume header record
    Start,
    Intermediate,
    /// Last chunk of a volume
    End,
}

impl ChunkType {
    /// Single-character wire code.
    pub fn code(&self) -> char {
        match self {
            ChunkType::Start => 'S',
            ChunkType::Intermediate => 'I',
            ChunkType::End => 'E',
        }
    }

    pub fn from_code(code: &str) -> Result<Self, KeyParseError> {
        match code {
            "S" => Ok(ChunkType::Start),
            "I" => Ok(ChunkType::Intermediate),
            "E" => Ok(ChunkType::End),
            other => Err(KeyParseError::InvalidChunkType(other.to_string())),
        }
    }
}

/// Everything a chunk key tells us about the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkIdentity {
    pub site: String,
    pub volume_number: String,
    pub timestamp: DateTime<Utc>,
    pub chunk_number: u32,
    pub chunk_type: ChunkType,
    pub raw_key: String,
}

impl ChunkIdentity {
    /// Parse a chunk key.
    pub fn parse(key: &str) -> Result<Self, KeyParseError> {
        let segments: Vec<&str> = key.split('/').collect();
        if segments.len() != 3 {
            return Err(KeyParseError::SegmentCount(segments.len()));
        }
        let (site, volume_number, trailer) = (segments[0], segments[1], segments[2]);
        if site.is_empty() {
            return Err(KeyParseError::EmptySegment("site"));
        }
        if volume_number.is_empty() {
            return Err(KeyParseError::EmptySegment("volume number"));
        }

        let fields: Vec<&str> = trailer.split('-').collect();
        if fields.len() != 4 {
            return Err(KeyParseError::TrailerFieldCount(fields.len()));
        }
        let (date, time, number, kind) = (fields[0], fields[1], fields[2], fields[3]);

        let timestamp = parse_timestamp(date, time)?;

        let chunk_number = number
            .parse::<u32>()
            .map_err(|_| KeyParseError::InvalidChunkNumber(number.to_string()))?;

        let chunk_type = ChunkType::from_code(kind)?;

        Ok(Self {
            site: site.to_string(),
            volume_number: volume_number.to_string(),
            timestamp,
            chunk_number,
            chunk_type,
            raw_key: key.to_string(),
        })
    }

    /// Key used to group chunks into volumes.
    pub fn volume_key(&self) -> (&str, &str) {
        (&self.site, &self.volume_number)
    }

    /// Render the `YYYYMMDD-HHMMSS-N-T` trailer segment.
    pub fn trailer(&self) -> String {
        format!(
            "{}-{}-{}",
            self.timestamp.format("%Y%m%d-%H%M%S"),
            self.chunk_number,
            self.chunk_type.code()
        )
    }

    pub fn is_start(&self) -> bool {
        self.chunk_type == ChunkType::Start
    }
}

impl fmt::Display for ChunkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.site, self.volume_number, self.trailer())
    }
}

impl FromStr for ChunkIdentity {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Chunk number used to order a key within its volume; keys that do not
/// parse sort last.
pub fn chunk_sort_number(key: &str) -> u64 {
    ChunkIdentity::parse(key)
        .map(|id| id.chunk_number as u64)
        .unwrap_or(u64::MAX)
}

fn parse_timestamp(date: &str, time: &str) -> Result<DateTime<Utc>, KeyParseError> {
    let invalid = || KeyParseError::InvalidTimestamp {
        date: date.to_string(),
        time: time.to_string(),
    };

    // chrono accepts variable-width fields, so pin the exact widths first
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if date.len() != 8 || time.len() != 6 || !all_digits(date) || !all_digits(time) {
        return Err(invalid());
    }

    NaiveDateTime::parse_from_str(&format!("{}{}", date, time), "%Y%m%d%H%M%S")
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .map_err(|_| invalid())
}
