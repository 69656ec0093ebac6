//! End-to-end tests of the consolidation pipeline
//!
//! Covers:
//! - Idempotence of rebuild from flattened records
//! - Conservation of records through grouping
//! - Channel-code uniqueness within streams
//! - Duplicate tie-break, colocation, alignment and window-failure examples
//! - Status summaries, selection, labels and parameter preservation

use seiscol_common::time::{from_epoch_seconds, seconds_between};
use seiscol_engine::config::{EngineConfig, PreferenceCriterion};
use seiscol_engine::record::{ChannelRecord, Coordinates, ProcessLevel, RecordHeader};
use seiscol_engine::status::{NetworkStatus, StatusGranularity, StatusReport};
use seiscol_engine::stream::{GroupingMode, InstrumentStream};
use seiscol_engine::{Collection, Error};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};

const T0: f64 = 1_600_000_000.0;

struct Fixture<'a> {
    network: &'a str,
    station: &'a str,
    location: &'a str,
    channel: &'a str,
    rate: f64,
    start: f64,
    npts: usize,
    level: ProcessLevel,
}

impl<'a> Fixture<'a> {
    fn new(station: &'a str, channel: &'a str) -> Self {
        Self {
            network: "CI",
            station,
            location: "--",
            channel,
            rate: 100.0,
            start: T0,
            npts: 1000,
            level: ProcessLevel::V1,
        }
    }

    fn build(&self) -> ChannelRecord {
        let header = RecordHeader {
            network: self.network.to_string(),
            station: self.station.to_string(),
            location: self.location.to_string(),
            channel: self.channel.to_string(),
            sampling_rate: self.rate,
            start_time: from_epoch_seconds(self.start),
            coordinates: Coordinates::new(34.05, -118.25, 100.0),
            process_level: self.level,
            source_format: "cosmos".to_string(),
            source_file: format!("{}.{}.{}", self.station, self.channel, self.level),
            ..Default::default()
        };
        let data = (0..self.npts)
            .map(|i| (i as f64 / self.rate * 2.0 * std::f64::consts::PI).sin())
            .collect();
        ChannelRecord::new(header, data).unwrap()
    }
}

fn three_component(station: &str, instrument: &str) -> Vec<ChannelRecord> {
    ["1", "2", "Z"]
        .iter()
        .map(|o| Fixture::new(station, &format!("{}{}", instrument, o)).build())
        .collect()
}

/// Stream id -> sorted record ids and pass state
fn membership(collection: &Collection) -> BTreeMap<String, (Vec<String>, bool)> {
    collection
        .iter()
        .map(|s| {
            let mut ids: Vec<String> = s.iter().map(|r| r.id()).collect();
            ids.sort();
            (s.id().to_string(), (ids, s.passed()))
        })
        .collect()
}

// ============================================================================
// Test Group 1: Pipeline properties
// ============================================================================

#[test]
fn test_rebuild_from_records_is_idempotent() {
    let mut records = three_component("AAA", "HN");
    let mut dup = Fixture::new("AAA", "HNN");
    dup.level = ProcessLevel::V2;
    records.push(dup.build());
    records.extend(three_component("BBB", "HN"));
    records.extend(three_component("BBB", "BN"));

    let config = EngineConfig::default();
    let first = Collection::from_records(records, &config).unwrap();
    assert_eq!(first.rejected_duplicates().len(), 1);
    let before = membership(&first);

    let second = Collection::from_records(first.into_records(), &config).unwrap();
    assert!(second.rejected_duplicates().is_empty());
    assert_eq!(membership(&second), before);
}

#[test]
fn test_grouping_conserves_records() {
    let mut records = Vec::new();
    for station in ["S01", "S02", "S03", "S04"] {
        records.extend(three_component(station, "HN"));
    }
    let n = records.len();

    let collection = Collection::from_records(records, &EngineConfig::default()).unwrap();
    assert_eq!(collection.len(), 4);
    let total: usize = collection.iter().map(|s| s.len()).sum();
    assert_eq!(total, n);
}

#[test]
fn test_channel_codes_unique_within_streams() {
    let mut records = three_component("AAA", "HN");
    records.extend(three_component("AAA", "BN"));
    records.extend(three_component("CCC", "HH"));

    let collection = Collection::from_records(records, &EngineConfig::default()).unwrap();
    for stream in &collection {
        let codes: HashSet<&str> = stream.iter().map(|r| r.channel()).collect();
        assert_eq!(codes.len(), stream.len());
    }
}

// ============================================================================
// Test Group 2: Worked examples
// ============================================================================

#[test]
fn test_duplicate_resolved_by_process_level() {
    let mut v1 = Fixture::new("ABCD", "HN1");
    v1.level = ProcessLevel::V1;
    let mut v2 = Fixture::new("ABCD", "HNN");
    v2.level = ProcessLevel::V2;

    let mut config = EngineConfig::default();
    config.duplicate.preference_order = vec![PreferenceCriterion::ProcessLevel];
    config.duplicate.process_level_preference =
        vec![ProcessLevel::V2, ProcessLevel::V1, ProcessLevel::V0];

    let collection = Collection::from_records(vec![v1.build(), v2.build()], &config).unwrap();
    let survivors: Vec<&ChannelRecord> = collection.iter().flat_map(|s| s.iter()).collect();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].process_level(), ProcessLevel::V2);

    let rejected = collection.rejected_duplicates();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].process_level(), ProcessLevel::V1);
    assert!(!rejected[0].passed());
}

#[test]
fn test_colocated_broadband_loses_to_strong_motion() {
    let mut records = three_component("ABCD", "BN");
    records.extend(three_component("ABCD", "HN"));

    let mut config = EngineConfig::default();
    config.colocated.preference = vec!["HN?".to_string(), "BN?".to_string()];

    let collection = Collection::from_records(records, &config).unwrap();
    let hn = collection.select(None, Some("ABCD"), Some("HN")).unwrap();
    let bn = collection.select(None, Some("ABCD"), Some("BN")).unwrap();
    assert!(hn[0].passed());
    assert!(!bn[0].passed());
    for record in bn[0].iter() {
        assert!(record.failure().unwrap().reason.contains("HN"));
    }
}

#[test]
fn test_colocation_disabled_keeps_both() {
    let mut records = three_component("ABCD", "BN");
    records.extend(three_component("ABCD", "HN"));

    let mut config = EngineConfig::default();
    config.colocated.enabled = false;
    let collection = Collection::from_records(records, &config).unwrap();
    assert_eq!(collection.n_passed(), 2);
}

#[test]
fn test_subsample_offset_aligned_by_trimming() {
    let a = Fixture {
        npts: 1001,
        ..Fixture::new("ABCD", "HN1")
    };
    let b = Fixture {
        start: T0 + 0.004,
        ..Fixture::new("ABCD", "HN2")
    };

    let collection = Collection::from_records(vec![a.build(), b.build()], &EngineConfig::default()).unwrap();
    assert_eq!(collection.len(), 1);
    let stream = &collection.streams()[0];
    assert!(stream.passed());
    for record in stream {
        assert!(record.provenance().contains("cut"));
        assert!(!record.provenance().contains("interpolate"));
        assert_eq!(record.npts(), 1000);
    }
}

#[test]
fn test_rebuilds_do_not_cut_again() {
    let a = Fixture {
        npts: 1001,
        ..Fixture::new("ABCD", "HN1")
    };
    let b = Fixture {
        start: T0 + 0.004,
        ..Fixture::new("ABCD", "HN2")
    };
    let config = EngineConfig::default();

    let mut collection = Collection::from_records(vec![a.build(), b.build()], &config).unwrap();
    for _ in 0..3 {
        collection = Collection::from_records(collection.into_records(), &config).unwrap();
    }
    let extra = InstrumentStream::new(three_component("WXYZ", "HN"), GroupingMode::Instrument).unwrap();
    let collection = collection.append(extra).unwrap();

    let stream = &collection.select(None, Some("ABCD"), None).unwrap()[0];
    assert!(stream.passed());
    for record in stream.iter() {
        assert_eq!(record.provenance().activity_names(), vec!["cut"]);
    }
}

#[test]
fn test_distance_duplicates_are_not_chained() {
    // 00 and 10 are ~400 m apart, as are 10 and 20; 00 and 20 are ~800 m apart
    let records: Vec<ChannelRecord> = [("00", 34.0), ("10", 34.0036), ("20", 34.0072)]
        .iter()
        .map(|(loc, lat)| {
            let header = RecordHeader {
                network: "CI".to_string(),
                station: "ABCD".to_string(),
                location: loc.to_string(),
                channel: "HNZ".to_string(),
                sampling_rate: 100.0,
                start_time: from_epoch_seconds(T0),
                coordinates: Coordinates::new(*lat, -118.0, 0.0),
                source_file: format!("ABCD.{}", loc),
                ..Default::default()
            };
            ChannelRecord::new(header, vec![0.0; 200]).unwrap()
        })
        .collect();

    let mut config = EngineConfig::default();
    config.duplicate.max_dist_tolerance = 500.0;
    let collection = Collection::from_records(records, &config).unwrap();

    let rejected = collection.rejected_duplicates();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].id(), "CI.ABCD.10.HNZ");
    assert_eq!(
        rejected[0].failure().unwrap().reason,
        "Duplicate of CI.ABCD.00.HNZ (ABCD.00)"
    );

    let mut kept: Vec<String> = collection
        .iter()
        .flat_map(|s| s.iter())
        .map(|r| r.id())
        .collect();
    kept.sort();
    assert_eq!(kept, vec!["CI.ABCD.00.HNZ", "CI.ABCD.20.HNZ"]);
}

#[test]
fn test_rate_mismatch_aligned_by_interpolation() {
    let a = Fixture::new("ABCD", "HN1");
    let b = Fixture {
        rate: 50.0,
        npts: 500,
        ..Fixture::new("ABCD", "HN2")
    };

    let collection = Collection::from_records(vec![a.build(), b.build()], &EngineConfig::default()).unwrap();
    let stream = &collection.streams()[0];
    assert!(stream.passed());
    let npts = stream.records()[0].npts();
    for record in stream {
        let interp = record.provenance().interpolations().last().unwrap();
        assert_eq!(interp.a, 20);
        assert_eq!(interp.new_number_of_samples, npts);
        assert_eq!(record.npts(), npts);
        assert!((record.sampling_rate() - 100.0).abs() < 1e-9);
    }
    let first = &stream.records()[0];
    let second = &stream.records()[1];
    assert_eq!(seconds_between(first.start_time(), second.start_time()), 0.0);
}

#[test]
fn test_disjoint_records_fail_without_error() {
    let a = Fixture::new("ABCD", "HN1");
    let b = Fixture {
        start: T0 + 100.0,
        ..Fixture::new("ABCD", "HN2")
    };

    let collection = Collection::from_records(vec![a.build(), b.build()], &EngineConfig::default()).unwrap();
    assert_eq!(collection.n_failed(), 1);
    let stream = &collection.streams()[0];
    for record in stream {
        assert!(record
            .failure()
            .unwrap()
            .reason
            .contains("start time after the end time"));
        assert_eq!(record.npts(), 1000);
    }
}

// ============================================================================
// Test Group 3: Grouping options
// ============================================================================

#[test]
fn test_location_network_split() {
    let records: Vec<ChannelRecord> = [("01", "HN1"), ("01", "HN2"), ("02", "HN1"), ("02", "HN2")]
        .iter()
        .map(|(loc, chan)| {
            Fixture {
                network: "RE",
                location: loc,
                ..Fixture::new("DAM", chan)
            }
            .build()
        })
        .collect();

    let mut config = EngineConfig::default();
    config.grouping.handle_duplicates = false;
    let collection = Collection::from_records(records, &config).unwrap();
    assert_eq!(collection.len(), 2);
    assert!(collection.iter().all(|s| s.len() == 2));
}

#[test]
fn test_non_free_field_records_set_aside() {
    let mut records = three_component("AAA", "HN");
    let roof = RecordHeader {
        network: "CI".to_string(),
        station: "BLDG".to_string(),
        channel: "HNZ".to_string(),
        sampling_rate: 100.0,
        structure_type: "Building roof".to_string(),
        ..Default::default()
    };
    records.push(ChannelRecord::new(roof, vec![0.0; 10]).unwrap());

    let collection = Collection::from_records(records, &EngineConfig::default()).unwrap();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.non_free_field().len(), 1);
}

// ============================================================================
// Test Group 4: Query surface
// ============================================================================

#[test]
fn test_status_summaries() {
    let mut records = three_component("ABCD", "BN");
    records.extend(three_component("ABCD", "HN"));
    records.extend(three_component("EFGH", "HN"));
    let collection = Collection::from_records(records, &EngineConfig::default()).unwrap();

    match collection.get_status("short").unwrap() {
        StatusReport::Short(counts) => {
            assert_eq!(counts, vec![("Colocated with HN instrument.".to_string(), 1)]);
        }
        other => panic!("unexpected {:?}", other),
    }
    match collection.status(StatusGranularity::Net) {
        StatusReport::Net(map) => {
            assert_eq!(map["CI"], NetworkStatus { passed: 2, failed: 1 });
        }
        other => panic!("unexpected {:?}", other),
    }
    match collection.get_status("long").unwrap() {
        StatusReport::Long(rows) => assert_eq!(rows.len(), 3),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        collection.get_status("verbose"),
        Err(Error::UnsupportedGranularity(_))
    ));
}

#[test]
fn test_select_with_patterns() {
    let mut records = three_component("ABCD", "HN");
    records.extend(three_component("ABCE", "HN"));
    records.extend(three_component("WXYZ", "HN"));
    let collection = Collection::from_records(records, &EngineConfig::default()).unwrap();

    assert_eq!(collection.select(Some("ci"), None, None).unwrap().len(), 3);
    assert_eq!(collection.select(None, Some("abc?"), None).unwrap().len(), 2);
    assert_eq!(collection.select(None, Some("W*"), Some("H?")).unwrap().len(), 1);
    assert!(collection.select(Some("NC"), None, None).unwrap().is_empty());
    assert!(matches!(
        collection.select(None, Some("[AB"), None),
        Err(Error::InvalidPattern { .. })
    ));
}

#[test]
fn test_stream_parameters_survive_regrouping() {
    let mut stream =
        InstrumentStream::new(three_component("ABCD", "HN"), GroupingMode::Instrument).unwrap();
    stream.set_parameter("signal_split", json!({"split_time": 12.5}));
    stream.set_tag(Some("ci39462536_default".to_string()));

    let collection = Collection::from_streams(vec![stream], &EngineConfig::default()).unwrap();
    let rebuilt = &collection.streams()[0];
    assert_eq!(rebuilt.parameter("signal_split").unwrap()["split_time"], 12.5);
    assert_eq!(rebuilt.label(), "default");
}

#[test]
fn test_append_and_merge_rebuild() {
    let config = EngineConfig::default();
    let base = Collection::from_records(three_component("AAA", "HN"), &config).unwrap();
    let extra = InstrumentStream::new(three_component("BBB", "HN"), GroupingMode::Instrument).unwrap();
    let appended = base.append(extra).unwrap();
    assert_eq!(appended.len(), 2);

    let other = Collection::from_records(three_component("CCC", "HN"), &config).unwrap();
    let merged = appended.merge(other).unwrap();
    assert_eq!(merged.len(), 3);
    assert_eq!(merged.n_passed(), 3);
    assert!(merged.to_string().contains("3 instrument stream(s) passed checks."));
}

#[test]
fn test_provenance_serialises_for_export() {
    let a = Fixture {
        npts: 1001,
        ..Fixture::new("ABCD", "HN1")
    };
    let b = Fixture {
        start: T0 + 0.004,
        ..Fixture::new("ABCD", "HN2")
    };
    let collection = Collection::from_records(vec![a.build(), b.build()], &EngineConfig::default()).unwrap();
    let record = &collection.streams()[0].records()[0];
    let json = serde_json::to_value(record.provenance()).unwrap();
    assert_eq!(json[0]["prov_id"], "cut");
    assert!(json[0]["prov_attributes"]["new_end_time"].is_string());
}
