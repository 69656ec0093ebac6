//! Instrument streams: the records of one instrument at one station
//!
//! Construction enforces the stream invariants:
//! - every member derives the same stream identity (fatal otherwise)
//! - members are time-aligned (see [`crate::alignment`])
//! - channel codes are unique, and rate/npts/start agree (soft: members fail)

use crate::alignment::{self, align_records};
use crate::error::{Error, Result};
use crate::record::{ChannelRecord, StationMetadata, TraceInput};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

const MODULE: &str = "stream";

/// How the stream identity is derived from a record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GroupingMode {
    /// `network.station.instrument_code`: all channels of one instrument
    #[default]
    Instrument,
    /// `network.station.location.channel`: one record per stream
    Array,
}

impl GroupingMode {
    /// Identity string of the stream `record` belongs to
    pub fn stream_id(&self, record: &ChannelRecord) -> String {
        match self {
            GroupingMode::Instrument => format!(
                "{}.{}.{}",
                record.network(),
                record.station(),
                record.instrument_code()
            ),
            GroupingMode::Array => record.id(),
        }
    }
}

/// Ordered records sharing one stream identity
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentStream {
    id: String,
    mode: GroupingMode,
    records: Vec<ChannelRecord>,
    parameters: BTreeMap<String, Value>,
    tag: Option<String>,
}

impl InstrumentStream {
    /// Build and validate a stream from `records`.
    ///
    /// # Errors
    /// - `EmptyStream` when `records` is empty
    /// - `InconsistentStreamId` when members derive different identities
    ///
    /// Data-quality problems do not error; they mark members failed.
    pub fn new(records: Vec<ChannelRecord>, mode: GroupingMode) -> Result<Self> {
        let first = records.first().ok_or(Error::EmptyStream)?;
        let id = mode.stream_id(first);
        if let Some(other) = records.iter().find(|r| mode.stream_id(r) != id) {
            return Err(Error::InconsistentStreamId {
                expected: id,
                found: mode.stream_id(other),
            });
        }

        let mut stream = Self {
            id,
            mode,
            records,
            parameters: BTreeMap::new(),
            tag: None,
        };
        align_records(&mut stream.records);
        stream.validate();
        Ok(stream)
    }

    /// Build a stream from full records and/or bare traces.
    ///
    /// Bare traces are promoted with `metadata`; without it they are an error.
    pub fn from_traces(
        traces: Vec<TraceInput>,
        metadata: Option<&StationMetadata>,
        mode: GroupingMode,
    ) -> Result<Self> {
        let records = traces
            .into_iter()
            .map(|t| t.into_record(metadata))
            .collect::<Result<Vec<_>>>()?;
        Self::new(records, mode)
    }

    fn validate(&mut self) {
        let unique = {
            let mut seen = HashSet::new();
            self.records
                .iter()
                .all(|r| seen.insert((r.network(), r.station(), r.channel())))
        };
        if !unique {
            self.fail_all(MODULE, "Nonunique channel code in instrument stream.");
        }

        let first_rate = self.records[0].sampling_rate();
        if self
            .records
            .iter()
            .any(|r| !alignment::rates_match(r.sampling_rate(), first_rate))
        {
            self.fail_all(
                MODULE,
                "Instrument stream records have different sampling rates.",
            );
        }

        let first_npts = self.records[0].npts();
        if self.records.iter().any(|r| r.npts() != first_npts) {
            self.fail_all(
                MODULE,
                "Instrument stream records have a different number of points.",
            );
        }

        let first_start = self.records[0].start_time();
        let min_delta = self
            .records
            .iter()
            .map(|r| r.delta())
            .fold(f64::INFINITY, f64::min);
        if self
            .records
            .iter()
            .any(|r| !alignment::starts_match(r.start_time(), first_start, min_delta))
        {
            self.fail_all(
                MODULE,
                "Instrument stream records have different start times.",
            );
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> GroupingMode {
        self.mode
    }

    pub fn records(&self) -> &[ChannelRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChannelRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false for a constructed stream
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn network(&self) -> &str {
        self.records[0].network()
    }

    pub fn station(&self) -> &str {
        self.records[0].station()
    }

    pub fn location(&self) -> &str {
        self.records[0].location()
    }

    pub fn instrument_code(&self) -> &str {
        self.records[0].instrument_code()
    }

    /// `network.station`
    pub fn net_sta(&self) -> String {
        format!("{}.{}", self.network(), self.station())
    }

    /// True when every member is free-field
    pub fn free_field(&self) -> bool {
        self.records.iter().all(|r| r.free_field())
    }

    /// A stream passes while none of its records has failed
    pub fn passed(&self) -> bool {
        self.records.iter().all(|r| r.passed())
    }

    /// Reason of the first failed record, if any
    pub fn failure_reason(&self) -> Option<&str> {
        self.records
            .iter()
            .find_map(|r| r.failure())
            .map(|f| f.reason.as_str())
    }

    /// Number of channels whose orientation character is not `Z`
    pub fn num_horizontal(&self) -> usize {
        self.records
            .iter()
            .filter(|r| !matches!(r.channel().chars().nth(2), Some('Z') | Some('z')))
            .count()
    }

    /// Mark every member failed
    pub fn fail_all(&mut self, module: &str, reason: &str) {
        for record in &mut self.records {
            record.fail(module, reason);
        }
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn set_parameter(&mut self, key: impl Into<String>, value: Value) {
        self.parameters.insert(key.into(), value);
    }

    /// # Errors
    /// `ParameterNotFound` when `key` was never set
    pub fn parameter(&self, key: &str) -> Result<&Value> {
        self.parameters
            .get(key)
            .ok_or_else(|| Error::ParameterNotFound(key.to_string()))
    }

    pub fn parameter_keys(&self) -> Vec<&str> {
        self.parameters.keys().map(String::as_str).collect()
    }

    /// Opaque tag, conventionally `eventid_label`
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn set_tag(&mut self, tag: Option<String>) {
        self.tag = tag;
    }

    /// Text after the last `_` of the tag; empty when untagged
    pub fn label(&self) -> &str {
        match &self.tag {
            Some(tag) => tag.rsplit('_').next().unwrap_or(""),
            None => "",
        }
    }

    pub(crate) fn set_metadata(&mut self, parameters: BTreeMap<String, Value>, tag: Option<String>) {
        self.parameters = parameters;
        self.tag = tag;
    }

    pub(crate) fn into_parts(self) -> (String, BTreeMap<String, Value>, Option<String>, Vec<ChannelRecord>) {
        (self.id, self.parameters, self.tag, self.records)
    }

    pub fn into_records(self) -> Vec<ChannelRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a InstrumentStream {
    type Item = &'a ChannelRecord;
    type IntoIter = std::slice::Iter<'a, ChannelRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for InstrumentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} record(s) in instrument stream {} ({})",
            self.records.len(),
            self.id,
            if self.passed() { "passed" } else { "failed" }
        )?;
        for record in &self.records {
            write!(f, "\n  {}", record)?;
        }
        Ok(())
    }
}
