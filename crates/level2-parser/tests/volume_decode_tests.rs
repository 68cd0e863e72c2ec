//! End-to-end decode tests: listing -> volume -> chunk bytes -> gates.
//!
//! All payloads are built with the synthetic builders in `test-utils` and
//! compressed with real bzip2, so every stage of the pipeline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, TimeZone, Utc};
use level2_parser::{
    assemble_volume, select_latest_volume, ChunkIdentity, ChunkListing, DecodeError,
    DecodeObserver, DecodeTarget, NoopObserver, RadarProduct, ScanAssembler,
};
use test_utils::{
    assert_approx_eq, chunk_payload, frame_message, keys, multi_block_payload, stations,
    volume_header_record, MomentSpec, RadialBuilder,
};

fn reflectivity() -> DecodeTarget {
    DecodeTarget::new(RadarProduct::BaseReflectivity, 0)
}

fn identity(key: &str) -> ChunkIdentity {
    ChunkIdentity::parse(key).expect("fixture key parses")
}

#[derive(Default)]
struct CountingObserver {
    radials_skipped: AtomicUsize,
    blocks_failed: AtomicUsize,
    chunks_truncated: AtomicUsize,
    messages_skipped: AtomicUsize,
    stations: AtomicUsize,
}

impl DecodeObserver for CountingObserver {
    fn radial_skipped(&self, _error: &DecodeError) {
        self.radials_skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn block_failed(&self, _index: usize, _error: &DecodeError) {
        self.blocks_failed.fetch_add(1, Ordering::SeqCst);
    }

    fn chunk_truncated(&self, _error: &DecodeError) {
        self.chunks_truncated.fetch_add(1, Ordering::SeqCst);
    }

    fn message_skipped(&self, _message_type: u8) {
        self.messages_skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn station_reference(&self, _station: &level2_parser::StationReference) {
        self.stations.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[test]
fn test_single_start_chunk_scenario() {
    let radial = RadialBuilder::new(90.0, 0)
        .station_id("KFWS")
        .volume_block(32.5, -97.3, 208)
        .moment(
            MomentSpec::new("REF", &[0, 1, 10, 20])
                .scale(2.0, 0.0)
                .geometry(1000, 250),
        )
        .message();
    let chunks = vec![(identity("KFWS/12/20240427-231512-1-S"), chunk_payload(&[radial]))];

    let scan = assemble_volume(&chunks, reflectivity(), &NoopObserver).unwrap();

    assert_eq!(scan.station_id, "KFWS");
    assert_eq!(scan.product, RadarProduct::BaseReflectivity);
    assert_eq!(scan.gates.len(), 2);
    assert_eq!(scan.gates[0].value, 5.0);
    assert_eq!(scan.gates[1].value, 10.0);
    // Gate index 2 and 3 along a 1000 m + 250 m/gate ray
    assert_approx_eq!(scan.gates[0].range_km, 1.5, 1e-9);
    assert_approx_eq!(scan.gates[1].range_km, 1.75, 1e-9);

    for gate in &scan.gates {
        assert!(gate.longitude > -97.3, "gate should be east of the station");
        assert_approx_eq!(gate.latitude, 32.5, 0.01);
        assert_eq!(gate.azimuth_deg, 90.0);
    }
    assert!(scan.gates[1].longitude > scan.gates[0].longitude);

    let station = scan.station.unwrap();
    assert_eq!(station.altitude_meters, 208);
    assert_eq!(scan.radial_count, 1);
}

#[test]
fn test_sentinels_never_produce_gates() {
    for (scale, offset) in [(1.0, 0.0), (2.0, 66.0), (0.5, -10.0)] {
        let radial = RadialBuilder::new(0.0, 0)
            .volume_block(35.0, -97.0, 370)
            .moment(MomentSpec::new("REF", &[0, 1, 0, 1]).scale(scale, offset))
            .message();
        let chunks = vec![(identity(keys::KTLX_START), chunk_payload(&[radial]))];
        let scan = assemble_volume(&chunks, reflectivity(), &NoopObserver).unwrap();
        assert!(!scan.has_data());
    }
}

#[test]
fn test_tilt_filtering() {
    let station = stations::KTLX;
    let low = RadialBuilder::new(10.0, 0)
        .volume_block(station.latitude, station.longitude, station.altitude_m)
        .moment(MomentSpec::new("REF", &[50, 60]))
        .message();
    let high = RadialBuilder::new(10.0, 1)
        .elevation_angle(1.5)
        .volume_block(station.latitude, station.longitude, station.altitude_m)
        .moment(MomentSpec::new("REF", &[70, 80, 90]))
        .message();
    let chunks = vec![(identity(keys::KTLX_START), chunk_payload(&[low, high]))];

    let tilt0 = assemble_volume(&chunks, reflectivity(), &NoopObserver).unwrap();
    assert_eq!(tilt0.gates.len(), 2);

    let tilt1 = assemble_volume(
        &chunks,
        DecodeTarget::new(RadarProduct::BaseReflectivity, 1),
        &NoopObserver,
    )
    .unwrap();
    assert_eq!(tilt1.gates.len(), 3);
    assert_eq!(tilt1.elevation_angle, Some(1.5));
    assert!(tilt1.gates.iter().all(|g| (g.elevation_deg - 1.5).abs() < 1e-6));
}

// ============================================================================
// Fault tolerance
// ============================================================================

#[test]
fn test_corrupt_tail_keeps_earlier_gates() {
    let radial = RadialBuilder::new(45.0, 0)
        .volume_block(35.0, -97.0, 370)
        .moment(MomentSpec::new("REF", &[10, 20, 30]))
        .message();
    let mut payload = chunk_payload(&[radial]);
    // A control word claiming more bytes than remain
    payload.extend_from_slice(&5000i32.to_be_bytes());
    payload.extend_from_slice(&[0xAB; 16]);

    let observer = CountingObserver::default();
    let chunks = vec![(identity(keys::KTLX_START), payload)];
    let scan = assemble_volume(&chunks, reflectivity(), &observer).unwrap();

    assert_eq!(scan.gates.len(), 3);
    assert_eq!(observer.chunks_truncated.load(Ordering::SeqCst), 1);
}

#[test]
fn test_bad_block_between_good_blocks() {
    let first = RadialBuilder::new(1.0, 0)
        .volume_block(35.0, -97.0, 370)
        .moment(MomentSpec::new("REF", &[10]))
        .message();
    let last = RadialBuilder::new(2.0, 0)
        .moment(MomentSpec::new("REF", &[20]))
        .message();

    let mut payload = multi_block_payload(&[vec![first]]);
    let garbage = b"not a bzip2 stream at all";
    payload.extend_from_slice(&(garbage.len() as i32).to_be_bytes());
    payload.extend_from_slice(garbage);
    payload.extend(multi_block_payload(&[vec![last]]));

    let observer = CountingObserver::default();
    let chunks = vec![(identity(keys::KTLX_START), payload)];
    let scan = assemble_volume(&chunks, reflectivity(), &observer).unwrap();

    assert_eq!(scan.gates.len(), 2);
    assert_eq!(observer.blocks_failed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_bad_radial_is_isolated() {
    let good = RadialBuilder::new(1.0, 0)
        .volume_block(35.0, -97.0, 370)
        .moment(MomentSpec::new("REF", &[10, 20]))
        .message();
    // Declares two blocks but carries one
    let short = RadialBuilder::new(2.0, 0)
        .moment(MomentSpec::new("REF", &[30, 40]))
        .declared_blocks(2)
        .message();
    let tiny = frame_message(31, &[0u8; 20]);
    let after = RadialBuilder::new(3.0, 0)
        .moment(MomentSpec::new("REF", &[50]))
        .message();

    let observer = CountingObserver::default();
    let chunks = vec![(
        identity(keys::KTLX_START),
        chunk_payload(&[good, short, tiny, after]),
    )];
    let scan = assemble_volume(&chunks, reflectivity(), &observer).unwrap();

    let azimuths: Vec<f64> = scan.gates.iter().map(|g| g.azimuth_deg).collect();
    assert_eq!(azimuths, vec![1.0, 1.0, 3.0]);
    assert_eq!(observer.radials_skipped.load(Ordering::SeqCst), 2);
}

#[test]
fn test_other_message_types_skipped() {
    let radial = RadialBuilder::new(1.0, 0)
        .volume_block(35.0, -97.0, 370)
        .moment(MomentSpec::new("REF", &[10]))
        .message();
    let status = frame_message(2, &[0u8; 60]);
    let adaptation = frame_message(18, &[0u8; 40]);

    let observer = CountingObserver::default();
    let chunks = vec![(
        identity(keys::KTLX_START),
        chunk_payload(&[status, radial, adaptation]),
    )];
    let scan = assemble_volume(&chunks, reflectivity(), &observer).unwrap();

    assert_eq!(scan.gates.len(), 1);
    assert_eq!(observer.messages_skipped.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Listing to scan
// ============================================================================

#[test]
fn test_latest_volume_decoded_in_chunk_order() {
    let base = Utc.with_ymd_and_hms(2024, 4, 27, 23, 15, 0).unwrap();
    let old_keys = keys::volume_keys("KTLX", 584, "20240427-230512", 2);
    let new_keys = keys::volume_keys("KTLX", 585, "20240427-231512", 3);

    let mut listings: Vec<ChunkListing> = Vec::new();
    for (i, key) in old_keys.iter().enumerate() {
        listings.push(ChunkListing::new(key.clone(), base + Duration::seconds(i as i64), 100));
    }
    // Listed out of order on purpose
    for (i, key) in new_keys.iter().enumerate().rev() {
        listings.push(ChunkListing::new(key.clone(), base + Duration::minutes(10 + i as i64), 100));
    }

    let volume = select_latest_volume(&listings, &NoopObserver).unwrap();
    assert_eq!(volume.volume_number, "585");
    assert!(volume.is_complete());

    let payloads: Vec<Vec<u8>> = volume
        .chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut builder = RadialBuilder::new(i as f32 * 10.0, 0);
            if chunk.identity.is_start() {
                builder = builder.volume_block(35.0, -97.0, 370);
            }
            let radial = builder.moment(MomentSpec::new("REF", &[10])).message();
            let mut payload = Vec::new();
            if chunk.identity.is_start() {
                payload.extend(volume_header_record(19841, 0, "KTLX"));
            }
            payload.extend(chunk_payload(&[radial]));
            payload
        })
        .collect();

    let observer = NoopObserver;
    let mut assembler = ScanAssembler::new(&volume.site, reflectivity(), &observer);
    let start = volume.start_chunk().unwrap();
    assembler
        .decode_start_chunk(&start.identity, &payloads[0])
        .unwrap();
    for (i, chunk) in volume.chunks.iter().enumerate().skip(1) {
        assembler.decode_chunk(&chunk.identity, &payloads[i]).unwrap();
    }
    let scan = assembler.finish().unwrap();

    let azimuths: Vec<f64> = scan.gates.iter().map(|g| g.azimuth_deg).collect();
    assert_eq!(azimuths, vec![0.0, 10.0, 20.0]);
    assert_eq!(scan.volume_icao.as_deref(), Some("KTLX"));
    assert_eq!(assembler.summary().chunks, 3);
    assert_eq!(assembler.summary().gates, 3);
}

#[test]
fn test_station_reference_reported_once() {
    let radials: Vec<Vec<u8>> = (0..3)
        .map(|i| {
            RadialBuilder::new(i as f32, 0)
                .volume_block(35.0, -97.0, 370)
                .moment(MomentSpec::new("REF", &[10]))
                .message()
        })
        .collect();

    let observer = CountingObserver::default();
    let chunks = vec![(identity(keys::KTLX_START), chunk_payload(&radials))];
    let scan = assemble_volume(&chunks, reflectivity(), &observer).unwrap();

    assert_eq!(scan.gates.len(), 3);
    assert_eq!(observer.stations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_malformed_keys_rejected() {
    for key in keys::MALFORMED {
        assert!(ChunkIdentity::parse(key).is_err(), "{key} should not parse");
    }
}
