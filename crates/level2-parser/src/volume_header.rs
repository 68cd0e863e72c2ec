//! Volume header record (24 bytes) at the front of a Start chunk.
//!
//! Layout:
//! - bytes 0-8: tape name, e.g. `AR2V0006.`
//! - bytes 9-11: extension number
//! - bytes 12-15: modified Julian date, big-endian (day 1 = 1970-01-01)
//! - bytes 16-19: milliseconds past midnight, big-endian
//! - bytes 20-23: ICAO identifier

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;

pub const VOLUME_HEADER_SIZE: usize = 24;

const MAGIC: &[u8; 4] = b"AR2V";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeHeader {
    pub tape_name: String,
    pub extension: String,
    pub timestamp: DateTime<Utc>,
    pub icao: String,
}

impl VolumeHeader {
    /// Parse the record if `data` starts with one.
    ///
    /// Returns `None` when the magic is missing, the payload is shorter than
    /// the record, or the date fields are out of range.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if !Self::is_present(data) {
            return None;
        }

        let julian_date = u32::from_be_bytes([data[12], data[13], data[14], data[15]]);
        let millis = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
        let timestamp = julian_to_utc(julian_date, millis)?;

        Some(Self {
            tape_name: ascii_field(&data[0..9]),
            extension: ascii_field(&data[9..12]),
            timestamp,
            icao: ascii_field(&data[20..24]),
        })
    }

    /// Whether `data` begins with a volume header record.
    pub fn is_present(data: &[u8]) -> bool {
        data.len() >= VOLUME_HEADER_SIZE && &data[0..4] == MAGIC
    }
}

/// Convert NEXRAD modified Julian date + milliseconds of day to UTC.
pub fn julian_to_utc(julian_date: u32, millis: u32) -> Option<DateTime<Utc>> {
    if julian_date == 0 || millis >= 86_400_000 {
        return None;
    }
    let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).single()?;
    epoch.checked_add_signed(
        Duration::days(julian_date as i64 - 1) + Duration::milliseconds(millis as i64),
    )
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\0', ' '])
        .to_string()
}
