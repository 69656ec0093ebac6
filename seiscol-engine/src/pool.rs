//! Flat record pool with a side-table of pre-grouping stream metadata
//!
//! Regrouping dissolves streams into records. Stream parameters and tags are
//! kept in a table indexed by the stream each record came from, so records
//! themselves never carry grouping bookkeeping.

use crate::record::ChannelRecord;
use crate::stream::InstrumentStream;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub(crate) struct PooledRecord {
    pub(crate) record: ChannelRecord,
    /// Index into the metadata table of the stream this record came from
    pub(crate) origin: Option<usize>,
}

#[derive(Debug, Clone)]
struct StreamMetadata {
    id: String,
    parameters: BTreeMap<String, Value>,
    tag: Option<String>,
}

/// Records awaiting deduplication and grouping
#[derive(Debug, Clone, Default)]
pub struct RecordPool {
    entries: Vec<PooledRecord>,
    metadata: Vec<StreamMetadata>,
}

impl RecordPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool of records that belonged to no stream
    pub fn from_records(records: Vec<ChannelRecord>) -> Self {
        let mut pool = Self::new();
        for record in records {
            pool.push_record(record);
        }
        pool
    }

    /// Flatten `streams`, remembering each stream's parameters and tag
    pub fn from_streams(streams: Vec<InstrumentStream>) -> Self {
        let mut pool = Self::new();
        for stream in streams {
            pool.push_stream(stream);
        }
        pool
    }

    pub fn push_record(&mut self, record: ChannelRecord) {
        self.entries.push(PooledRecord {
            record,
            origin: None,
        });
    }

    pub fn push_stream(&mut self, stream: InstrumentStream) {
        let (id, parameters, tag, records) = stream.into_parts();
        let origin = self.metadata.len();
        self.metadata.push(StreamMetadata {
            id,
            parameters,
            tag,
        });
        self.entries
            .extend(records.into_iter().map(|record| PooledRecord {
                record,
                origin: Some(origin),
            }));
    }

    /// Move every record of `other` into this pool, keeping its stream metadata
    pub fn append(&mut self, other: RecordPool) {
        let offset = self.metadata.len();
        self.metadata.extend(other.metadata);
        self.entries
            .extend(other.entries.into_iter().map(|e| PooledRecord {
                record: e.record,
                origin: e.origin.map(|o| o + offset),
            }));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn into_records(self) -> Vec<ChannelRecord> {
        self.entries.into_iter().map(|e| e.record).collect()
    }

    /// Move out the records for which `take` returns true, keeping order
    pub(crate) fn extract<F>(&mut self, mut take: F) -> Vec<PooledRecord>
    where
        F: FnMut(&ChannelRecord) -> bool,
    {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| take(&e.record));
        self.entries = kept;
        taken
    }

    /// Split into entries and the metadata needed to restore stream attributes
    pub(crate) fn into_parts(self) -> (Vec<PooledRecord>, StreamMetadataTable) {
        (
            self.entries,
            StreamMetadataTable {
                streams: self.metadata,
            },
        )
    }

    pub(crate) fn from_parts(entries: Vec<PooledRecord>, table: StreamMetadataTable) -> Self {
        Self {
            entries,
            metadata: table.streams,
        }
    }
}

/// Parameters and tags of the streams a pool was flattened from
#[derive(Debug, Clone, Default)]
pub(crate) struct StreamMetadataTable {
    streams: Vec<StreamMetadata>,
}

impl StreamMetadataTable {
    /// Restore parameters and tag on a freshly grouped stream.
    ///
    /// Parameters come from the first earlier stream with the same identity
    /// that had any. The tag comes from the stream of the first member.
    pub(crate) fn reattach(&self, stream: &mut InstrumentStream, first_origin: Option<usize>) {
        let parameters = self
            .streams
            .iter()
            .find(|m| m.id == stream.id() && !m.parameters.is_empty())
            .map(|m| m.parameters.clone())
            .unwrap_or_default();
        let tag = first_origin
            .and_then(|i| self.streams.get(i))
            .and_then(|m| m.tag.clone());
        stream.set_metadata(parameters, tag);
    }
}
