//! Channel records: one channel's samples plus station/instrument metadata
//!
//! Records are produced by external format readers. Inside the engine they
//! are only ever re-timed (trim/interpolate) or marked failed; they are never
//! dropped to hide a problem.

use crate::error::{Error, Result};
use crate::provenance::{Provenance, ProvenanceEntry, ResponseRemoval};
use chrono::{DateTime, Utc};
use seiscol_common::time::{self, format_timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Location code written by readers when the source has none
pub const BLANK_LOCATION: &str = "--";

/// When a dip is within this many degrees of vertical the channel is relabelled `?Z`
pub const MAX_DIP_OFFSET: f64 = 0.1;

/// Structure types whose sensors are not free-field
const NON_FREE_FIELD_STRUCTURES: [&str; 11] = [
    "building",
    "bridge",
    "dam",
    "borehole",
    "hole",
    "crest",
    "toe",
    "foundation",
    "body",
    "roof",
    "floor",
];

/// How much correction has been applied to a record's samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProcessLevel {
    /// Raw digitizer counts
    #[default]
    V0,
    /// Uncorrected physical units
    V1,
    /// Corrected physical units
    V2,
    /// Derived time series
    V3,
}

impl ProcessLevel {
    pub fn code(&self) -> &'static str {
        match self {
            ProcessLevel::V0 => "V0",
            ProcessLevel::V1 => "V1",
            ProcessLevel::V2 => "V2",
            ProcessLevel::V3 => "V3",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProcessLevel::V0 => "raw counts",
            ProcessLevel::V1 => "uncorrected physical units",
            ProcessLevel::V2 => "corrected physical units",
            ProcessLevel::V3 => "derived time series",
        }
    }

    /// Parse from a level code (`V1`) or its description (`uncorrected physical units`)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        [ProcessLevel::V0, ProcessLevel::V1, ProcessLevel::V2, ProcessLevel::V3]
            .into_iter()
            .find(|level| level.code().eq_ignore_ascii_case(s) || level.description() == s)
    }
}

impl FromStr for ProcessLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProcessLevel::parse(s)
            .ok_or_else(|| Error::InvalidRecord(format!("Unknown process level '{}'", s)))
    }
}

impl fmt::Display for ProcessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Coarse sensing direction of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrientationClass {
    North,
    East,
    Vertical,
}

impl OrientationClass {
    /// Classify from the orientation (third) character of a channel code.
    ///
    /// `1`/`N` are north-ish, `2`/`E` are east-ish, everything else is vertical.
    pub fn from_channel(channel: &str) -> Self {
        match channel.chars().nth(2) {
            Some('1') | Some('N') => OrientationClass::North,
            Some('2') | Some('E') => OrientationClass::East,
            _ => OrientationClass::Vertical,
        }
    }
}

/// Geographic position of the sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }

    /// Great-circle distance to `other` in meters
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        seiscol_common::geo::great_circle_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Why a record failed, and which stage said so
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub module: String,
    pub reason: String,
}

/// Manual review decision attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub accepted: bool,
    #[serde(default)]
    pub note: String,
}

/// True unless `structure_type` names a structure that biases ground motion.
pub fn is_free_field(structure_type: &str) -> bool {
    let lowered = structure_type.to_lowercase();
    !NON_FREE_FIELD_STRUCTURES
        .iter()
        .any(|kind| lowered.contains(kind))
}

/// Metadata a reader supplies alongside the samples
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub sampling_rate: f64,
    pub start_time: DateTime<Utc>,
    pub coordinates: Coordinates,
    /// Free text such as "Building roof"; drives the free-field flag
    pub structure_type: String,
    pub process_level: ProcessLevel,
    pub source_format: String,
    pub source_file: String,
    /// Dip from horizontal in degrees, when known
    pub vertical_orientation: Option<f64>,
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self {
            network: String::new(),
            station: String::new(),
            location: BLANK_LOCATION.to_string(),
            channel: String::new(),
            sampling_rate: 1.0,
            start_time: time::epoch(),
            coordinates: Coordinates::default(),
            structure_type: String::new(),
            process_level: ProcessLevel::default(),
            source_format: String::new(),
            source_file: String::new(),
            vertical_orientation: None,
        }
    }
}

/// A trace without station metadata (codes, timing and samples only)
#[derive(Debug, Clone, PartialEq)]
pub struct BareTrace {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub sampling_rate: f64,
    pub start_time: DateTime<Utc>,
    pub data: Vec<f64>,
}

/// Unit conversion already applied to a bare trace's samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitConversion {
    pub input_units: String,
    pub output_units: String,
}

/// External station metadata used to promote bare traces into records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationMetadata {
    pub coordinates: Coordinates,
    pub structure_type: String,
    pub process_level: ProcessLevel,
    pub source_format: String,
    pub source_file: String,
    pub vertical_orientation: Option<f64>,
    pub conversion: Option<UnitConversion>,
}

/// Input to stream construction: a full record, or a bare trace to be promoted
#[derive(Debug, Clone)]
pub enum TraceInput {
    Record(ChannelRecord),
    Bare(BareTrace),
}

impl From<ChannelRecord> for TraceInput {
    fn from(record: ChannelRecord) -> Self {
        TraceInput::Record(record)
    }
}

impl From<BareTrace> for TraceInput {
    fn from(trace: BareTrace) -> Self {
        TraceInput::Bare(trace)
    }
}

impl TraceInput {
    /// Resolve to a full record, promoting bare traces with `metadata`.
    pub fn into_record(self, metadata: Option<&StationMetadata>) -> Result<ChannelRecord> {
        match self {
            TraceInput::Record(record) => Ok(record),
            TraceInput::Bare(trace) => match metadata {
                Some(meta) => ChannelRecord::from_bare(trace, meta),
                None => Err(Error::InvalidRecord(format!(
                    "Trace {}.{}.{}.{} has no station metadata; supply StationMetadata to promote it",
                    trace.network, trace.station, trace.location, trace.channel
                ))),
            },
        }
    }
}

/// One channel's time series and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRecord {
    network: String,
    station: String,
    location: String,
    channel: String,
    data: Vec<f64>,
    sampling_rate: f64,
    start_time: DateTime<Utc>,
    coordinates: Coordinates,
    structure_type: String,
    free_field: bool,
    process_level: ProcessLevel,
    source_format: String,
    source_file: String,
    provenance: Provenance,
    failure: Option<Failure>,
    review: Option<Review>,
}

impl ChannelRecord {
    /// Build a record, validating the header.
    ///
    /// # Errors
    /// `InvalidRecord` when the station is empty, the channel code is shorter
    /// than three characters, or the sampling rate is not a positive number.
    pub fn new(header: RecordHeader, data: Vec<f64>) -> Result<Self> {
        let RecordHeader {
            network,
            station,
            location,
            mut channel,
            sampling_rate,
            start_time,
            coordinates,
            structure_type,
            process_level,
            source_format,
            source_file,
            vertical_orientation,
        } = header;

        if station.trim().is_empty() {
            return Err(Error::InvalidRecord(format!(
                "Record {}.?.{}.{} has no station code",
                network, location, channel
            )));
        }
        if channel.chars().count() < 3 {
            return Err(Error::InvalidRecord(format!(
                "Channel code '{}' for {}.{} must have at least three characters",
                channel, network, station
            )));
        }
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(Error::InvalidRecord(format!(
                "Sampling rate {} for {}.{}.{} must be positive",
                sampling_rate, network, station, channel
            )));
        }

        // Some readers cannot tell which channel is vertical; the dip can.
        if let Some(dip) = vertical_orientation {
            let offset = (dip.abs() - 90.0).abs();
            if offset < MAX_DIP_OFFSET && !channel.ends_with('Z') {
                let mut relabelled: String = channel.chars().take(channel.chars().count() - 1).collect();
                relabelled.push('Z');
                debug!(
                    "Relabelling {}.{}.{} as {} (dip {})",
                    network, station, channel, relabelled, dip
                );
                channel = relabelled;
            }
        }

        let free_field = is_free_field(&structure_type);
        Ok(Self {
            network,
            station,
            location,
            channel,
            data,
            sampling_rate,
            start_time,
            coordinates,
            structure_type,
            free_field,
            process_level,
            source_format,
            source_file,
            provenance: Provenance::new(),
            failure: None,
            review: None,
        })
    }

    /// Promote a bare trace using external station metadata.
    pub fn from_bare(trace: BareTrace, metadata: &StationMetadata) -> Result<Self> {
        let header = RecordHeader {
            network: trace.network,
            station: trace.station,
            location: trace.location,
            channel: trace.channel,
            sampling_rate: trace.sampling_rate,
            start_time: trace.start_time,
            coordinates: metadata.coordinates,
            structure_type: metadata.structure_type.clone(),
            process_level: metadata.process_level,
            source_format: metadata.source_format.clone(),
            source_file: metadata.source_file.clone(),
            vertical_orientation: metadata.vertical_orientation,
        };
        let mut record = ChannelRecord::new(header, trace.data)?;
        if let Some(conversion) = &metadata.conversion {
            record.push_provenance(ProvenanceEntry::RemoveResponse(ResponseRemoval {
                input_units: conversion.input_units.clone(),
                output_units: conversion.output_units.clone(),
            }));
        }
        Ok(record)
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// First two characters of the channel code (band + instrument)
    pub fn instrument_code(&self) -> &str {
        let end = self
            .channel
            .char_indices()
            .nth(2)
            .map(|(i, _)| i)
            .unwrap_or(self.channel.len());
        &self.channel[..end]
    }

    pub fn orientation(&self) -> OrientationClass {
        OrientationClass::from_channel(&self.channel)
    }

    /// Full identity `network.station.location.channel`
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn npts(&self) -> usize {
        self.data.len()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Sample interval in seconds
    pub fn delta(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Time of the last sample (equal to the start time for empty records)
    pub fn end_time(&self) -> DateTime<Utc> {
        let last = self.data.len().saturating_sub(1);
        time::sample_time(self.start_time, self.delta(), last)
    }

    pub fn starts_at_epoch(&self) -> bool {
        self.start_time == time::epoch()
    }

    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    pub fn structure_type(&self) -> &str {
        &self.structure_type
    }

    pub fn free_field(&self) -> bool {
        self.free_field
    }

    pub fn process_level(&self) -> ProcessLevel {
        self.process_level
    }

    pub fn source_format(&self) -> &str {
        &self.source_format
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn review(&self) -> Option<&Review> {
        self.review.as_ref()
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Mark the record failed.
    ///
    /// The failure is not last-write-wins: the first reason is kept and
    /// exported, later reasons are only logged. Records accepted in manual
    /// review ignore failures entirely.
    pub fn fail(&mut self, module: &str, reason: impl Into<String>) {
        let reason = reason.into();
        if self.review.as_ref().is_some_and(|r| r.accepted) {
            debug!(
                "{} - {} - ignoring failure on reviewed record: {}",
                module,
                self.id(),
                reason
            );
            return;
        }
        if let Some(existing) = &self.failure {
            debug!(
                "{} - {} - already failed ({}); not recording: {}",
                module,
                self.id(),
                existing.reason,
                reason
            );
            return;
        }
        info!("{} - {} - {}", module, self.id(), reason);
        self.failure = Some(Failure {
            module: module.to_string(),
            reason,
        });
    }

    /// Remove the failure flag, returning what it was
    pub fn clear_failure(&mut self) -> Option<Failure> {
        self.failure.take()
    }

    /// Record a manual review decision
    pub fn set_review(&mut self, accepted: bool, note: impl Into<String>) {
        if accepted {
            self.failure = None;
        }
        self.review = Some(Review {
            accepted,
            note: note.into(),
        });
    }

    pub(crate) fn push_provenance(&mut self, entry: ProvenanceEntry) {
        self.provenance.push(entry);
    }

    /// Keep the samples nearest to `[start, end]`.
    ///
    /// Boundary samples are snapped to the record's own grid, so the kept
    /// window may extend up to half a sample beyond the requested bounds.
    /// The window never extends the record.
    pub(crate) fn trim(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        if self.data.is_empty() {
            return;
        }
        let delta = self.delta();
        let last = (self.data.len() - 1) as f64;
        let first_idx = (time::seconds_between(start, self.start_time) / delta)
            .round()
            .clamp(0.0, last) as usize;
        let last_idx = (time::seconds_between(end, self.start_time) / delta)
            .round()
            .clamp(0.0, last) as usize;

        let new_start = time::sample_time(self.start_time, delta, first_idx);
        if last_idx < first_idx {
            self.data.clear();
        } else {
            self.data.truncate(last_idx + 1);
            self.data.drain(..first_idx);
        }
        self.start_time = new_start;
    }

    /// Replace samples and time base after resampling
    pub(crate) fn replace_samples(
        &mut self,
        data: Vec<f64>,
        start_time: DateTime<Utc>,
        sampling_rate: f64,
    ) {
        self.data = data;
        self.start_time = start_time;
        self.sampling_rate = sampling_rate;
    }
}

impl fmt::Display for ChannelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} - {} | {:.1} Hz, {} samples ({})",
            self.id(),
            format_timestamp(self.start_time),
            format_timestamp(self.end_time()),
            self.sampling_rate,
            self.npts(),
            if self.passed() { "passed" } else { "failed" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seiscol_common::time::from_epoch_seconds;

    fn header(channel: &str) -> RecordHeader {
        RecordHeader {
            network: "CI".to_string(),
            station: "ABCD".to_string(),
            channel: channel.to_string(),
            sampling_rate: 100.0,
            start_time: from_epoch_seconds(1_000.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_process_level_parse_code_and_description() {
        assert_eq!(ProcessLevel::parse("V2"), Some(ProcessLevel::V2));
        assert_eq!(
            ProcessLevel::parse("uncorrected physical units"),
            Some(ProcessLevel::V1)
        );
        assert_eq!(ProcessLevel::parse("V9"), None);
        assert!("bogus".parse::<ProcessLevel>().is_err());
    }

    #[test]
    fn test_orientation_classes() {
        assert_eq!(OrientationClass::from_channel("HN1"), OrientationClass::North);
        assert_eq!(OrientationClass::from_channel("HNN"), OrientationClass::North);
        assert_eq!(OrientationClass::from_channel("HN2"), OrientationClass::East);
        assert_eq!(OrientationClass::from_channel("HNE"), OrientationClass::East);
        assert_eq!(OrientationClass::from_channel("HNZ"), OrientationClass::Vertical);
        assert_eq!(OrientationClass::from_channel("HN3"), OrientationClass::Vertical);
    }

    #[test]
    fn test_free_field_from_structure_type() {
        assert!(is_free_field(""));
        assert!(is_free_field("Free field reference site"));
        assert!(!is_free_field("Building roof"));
        assert!(!is_free_field("BOREHOLE"));
    }

    #[test]
    fn test_new_rejects_short_channel() {
        let result = ChannelRecord::new(header("HN"), vec![0.0; 10]);
        assert!(matches!(result, Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn test_new_rejects_bad_sampling_rate() {
        let mut h = header("HNZ");
        h.sampling_rate = 0.0;
        assert!(ChannelRecord::new(h, vec![0.0; 10]).is_err());
    }

    #[test]
    fn test_vertical_relabel_from_dip() {
        let mut h = header("HN3");
        h.vertical_orientation = Some(-90.0);
        let record = ChannelRecord::new(h, vec![0.0; 10]).unwrap();
        assert_eq!(record.channel(), "HNZ");

        let mut h = header("HN1");
        h.vertical_orientation = Some(0.0);
        let record = ChannelRecord::new(h, vec![0.0; 10]).unwrap();
        assert_eq!(record.channel(), "HN1");
    }

    #[test]
    fn test_identity_and_timing() {
        let record = ChannelRecord::new(header("HN1"), vec![0.0; 101]).unwrap();
        assert_eq!(record.id(), "CI.ABCD.--.HN1");
        assert_eq!(record.instrument_code(), "HN");
        assert_eq!(
            time::seconds_between(record.end_time(), record.start_time()),
            1.0
        );
    }

    #[test]
    fn test_first_failure_wins() {
        let mut record = ChannelRecord::new(header("HNZ"), vec![0.0; 10]).unwrap();
        record.fail("alignment", "first");
        record.fail("validation", "second");
        assert_eq!(record.failure().unwrap().reason, "first");
        assert_eq!(record.failure().unwrap().module, "alignment");
        assert!(record.clear_failure().is_some());
        assert!(record.passed());
    }

    #[test]
    fn test_review_acceptance_blocks_failures() {
        let mut record = ChannelRecord::new(header("HNZ"), vec![0.0; 10]).unwrap();
        record.set_review(true, "looks fine");
        record.fail("colocation", "should be ignored");
        assert!(record.passed());
    }

    #[test]
    fn test_trim_snaps_to_nearest_samples() {
        let mut record = ChannelRecord::new(header("HNZ"), (0..100).map(|i| i as f64).collect()).unwrap();
        let start = from_epoch_seconds(1_000.104);
        let end = from_epoch_seconds(1_000.5);
        record.trim(start, end);
        assert_eq!(record.data()[0], 10.0);
        assert_eq!(record.npts(), 41);
        assert!((time::seconds_between(record.start_time(), from_epoch_seconds(1_000.1))).abs() < 1e-9);
    }

    #[test]
    fn test_bare_trace_requires_metadata() {
        let bare = BareTrace {
            network: "CI".to_string(),
            station: "ABCD".to_string(),
            location: "--".to_string(),
            channel: "HNZ".to_string(),
            sampling_rate: 100.0,
            start_time: from_epoch_seconds(0.0),
            data: vec![0.0; 5],
        };
        assert!(TraceInput::from(bare.clone()).into_record(None).is_err());

        let meta = StationMetadata {
            conversion: Some(UnitConversion {
                input_units: "counts".to_string(),
                output_units: "cm/s^2".to_string(),
            }),
            ..Default::default()
        };
        let record = TraceInput::from(bare).into_record(Some(&meta)).unwrap();
        assert_eq!(record.provenance().activity_names(), vec!["remove_response"]);
    }
}
