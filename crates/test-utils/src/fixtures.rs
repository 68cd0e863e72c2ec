//! Common test fixtures for Level II tests.
//!
//! This module provides pre-defined chunk keys and radar sites that show
//! up across the test suite.

/// Chunk keys in the bucket's `SITE/VOLUME/YYYYMMDD-HHMMSS-N-T` layout.
pub mod keys {
    /// Start chunk of KTLX volume 585
    pub const KTLX_START: &str = "KTLX/585/20240427-231512-1-S";

    /// Intermediate chunk of KTLX volume 585
    pub const KTLX_INTERMEDIATE: &str = "KTLX/585/20240427-231512-2-I";

    /// End chunk of KTLX volume 585
    pub const KTLX_END: &str = "KTLX/585/20240427-231512-3-E";

    /// Keys that must never parse
    pub const MALFORMED: &[&str] = &[
        "",
        "KTLX",
        "KTLX/585",
        "KTLX/585/20240427-231512-1",
        "KTLX/585/20240427-231512-x-S",
        "KTLX/585/20240427-231512-1-Q",
        "KTLX/585/20241327-231512-1-S",
        "KTLX//20240427-231512-1-S",
        "KTLX/585/20240427-231512-1-S/extra",
    ];

    /// Keys for one volume: a Start chunk, `count - 2` Intermediate chunks
    /// and an End chunk, numbered from 1.
    pub fn volume_keys(site: &str, volume: u32, stamp: &str, count: u32) -> Vec<String> {
        (1..=count)
            .map(|n| {
                let kind = if n == 1 {
                    'S'
                } else if n == count {
                    'E'
                } else {
                    'I'
                };
                format!("{site}/{volume}/{stamp}-{n}-{kind}")
            })
            .collect()
    }
}

/// Radar sites with their published positions.
pub mod stations {
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct StationFixture {
        pub id: &'static str,
        pub latitude: f32,
        pub longitude: f32,
        pub altitude_m: i16,
    }

    /// Oklahoma City, OK
    pub const KTLX: StationFixture = StationFixture {
        id: "KTLX",
        latitude: 35.333,
        longitude: -97.278,
        altitude_m: 370,
    };

    /// Dallas/Fort Worth, TX
    pub const KFWS: StationFixture = StationFixture {
        id: "KFWS",
        latitude: 32.573,
        longitude: -97.303,
        altitude_m: 208,
    };

    /// Amarillo, TX
    pub const KAMA: StationFixture = StationFixture {
        id: "KAMA",
        latitude: 35.233,
        longitude: -101.709,
        altitude_m: 1093,
    };

    pub const ALL: &[StationFixture] = &[KTLX, KFWS, KAMA];
}
