//! Collection: the consolidated, queryable set of instrument streams
//!
//! Construction runs the whole pipeline on a flat record pool:
//! 1. set aside non-free-field records (when configured)
//! 2. resolve duplicates (when configured)
//! 3. group into instrument streams, aligning each
//! 4. check that stream tag labels agree
//! 5. select among colocated instruments (when configured)
//!
//! A collection is never patched in place. `append` and `merge` rebuild it.

use crate::colocation::{ColocationSelector, EventOrigin};
use crate::config::EngineConfig;
use crate::dedup::DuplicateResolver;
use crate::error::{Error, Result};
use crate::grouping::Grouper;
use crate::pattern::StreamSelector;
use crate::pool::RecordPool;
use crate::record::ChannelRecord;
use crate::status::{StatusGranularity, StatusReport};
use crate::stream::InstrumentStream;
use std::fmt;
use tracing::{debug, info};

const INDENT: &str = "  ";

#[derive(Debug, Clone)]
pub struct Collection {
    streams: Vec<InstrumentStream>,
    rejected_duplicates: Vec<ChannelRecord>,
    non_free_field: Vec<ChannelRecord>,
    config: EngineConfig,
    event: Option<EventOrigin>,
}

impl Collection {
    /// Build from a flat list of records
    pub fn from_records(records: Vec<ChannelRecord>, config: &EngineConfig) -> Result<Self> {
        Self::build(RecordPool::from_records(records), config, None)
    }

    /// Flatten `streams` and rebuild. Stream parameters and tags carry over
    /// to regrouped streams with the same identity.
    pub fn from_streams(streams: Vec<InstrumentStream>, config: &EngineConfig) -> Result<Self> {
        Self::build(RecordPool::from_streams(streams), config, None)
    }

    /// Run the full pipeline on `pool`.
    ///
    /// `event` enables the large-distance colocation override when configured.
    ///
    /// # Errors
    /// `InconsistentLabels` when streams carry different tag labels, and
    /// `InvalidPattern`/`Config` for unusable configuration.
    pub fn build(pool: RecordPool, config: &EngineConfig, event: Option<&EventOrigin>) -> Result<Self> {
        config.validate()?;
        let mut pool = pool;
        let input_count = pool.len();

        let non_free_field = if config.grouping.drop_non_free_field {
            pool.extract(|r| !r.free_field())
                .into_iter()
                .map(|entry| {
                    debug!(
                        "Omitting record {} from collection because it is not free field",
                        entry.record.id()
                    );
                    entry.record
                })
                .collect()
        } else {
            Vec::new()
        };

        let (pool, rejected_duplicates) = if config.grouping.handle_duplicates && !pool.is_empty() {
            DuplicateResolver::new(&config.duplicate).resolve_pool(pool)
        } else {
            (pool, Vec::new())
        };

        let streams = Grouper::new(&config.grouping).group(pool)?;

        let mut collection = Self {
            streams,
            rejected_duplicates,
            non_free_field,
            config: config.clone(),
            event: event.copied(),
        };
        collection.validate_labels()?;

        if config.colocated.enabled {
            collection.select_colocated(event)?;
        }

        info!(
            "Built collection from {} records: {} streams ({} passed, {} failed), {} duplicates, {} not free field",
            input_count,
            collection.len(),
            collection.n_passed(),
            collection.n_failed(),
            collection.rejected_duplicates.len(),
            collection.non_free_field.len()
        );
        Ok(collection)
    }

    fn validate_labels(&self) -> Result<()> {
        let mut labels: Vec<String> = Vec::new();
        for stream in &self.streams {
            let label = stream.label();
            if !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
        if labels.len() > 1 {
            return Err(Error::InconsistentLabels(labels));
        }
        Ok(())
    }

    /// Run colocation selection with this collection's configuration.
    ///
    /// Already-failed streams are left alone, so repeating it is harmless.
    pub fn select_colocated(&mut self, event: Option<&EventOrigin>) -> Result<()> {
        ColocationSelector::new(&self.config.colocated).apply(&mut self.streams, event)
    }

    pub fn streams(&self) -> &[InstrumentStream] {
        &self.streams
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InstrumentStream> {
        self.streams.iter()
    }

    /// Mutable access for downstream stages that flag records
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, InstrumentStream> {
        self.streams.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&InstrumentStream> {
        self.streams.get(index)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Losers of duplicate resolution, each failed with the winner's id
    pub fn rejected_duplicates(&self) -> &[ChannelRecord] {
        &self.rejected_duplicates
    }

    /// Records set aside because they are not free-field
    pub fn non_free_field(&self) -> &[ChannelRecord] {
        &self.non_free_field
    }

    pub fn n_passed(&self) -> usize {
        self.streams.iter().filter(|s| s.passed()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.len() - self.n_passed()
    }

    /// Streams whose network, station and instrument codes match the given
    /// glob patterns (case-insensitive; `None` matches anything)
    pub fn select(
        &self,
        network: Option<&str>,
        station: Option<&str>,
        instrument: Option<&str>,
    ) -> Result<Vec<&InstrumentStream>> {
        let selector = StreamSelector::new(network, station, instrument)?;
        Ok(self.streams.iter().filter(|s| selector.matches(s)).collect())
    }

    pub fn status(&self, granularity: StatusGranularity) -> StatusReport {
        StatusReport::build(&self.streams, granularity)
    }

    /// Status by name: `"short"`, `"net"` or `"long"`
    ///
    /// # Errors
    /// `UnsupportedGranularity` for any other name
    pub fn get_status(&self, granularity: &str) -> Result<StatusReport> {
        Ok(self.status(granularity.parse()?))
    }

    /// Rebuild with one more stream
    pub fn append(self, stream: InstrumentStream) -> Result<Self> {
        let (config, event) = (self.config.clone(), self.event);
        let (mut pool, mut rejected, mut non_free) = self.into_pool();
        pool.push_stream(stream);
        let mut rebuilt = Self::build(pool, &config, event.as_ref())?;
        rejected.append(&mut rebuilt.rejected_duplicates);
        non_free.append(&mut rebuilt.non_free_field);
        rebuilt.rejected_duplicates = rejected;
        rebuilt.non_free_field = non_free;
        Ok(rebuilt)
    }

    /// Rebuild from the streams of both collections, using this one's config
    pub fn merge(self, other: Collection) -> Result<Self> {
        let (config, event) = (self.config.clone(), self.event);
        let (mut pool, mut rejected, mut non_free) = self.into_pool();
        let (other_pool, mut other_rejected, mut other_non_free) = other.into_pool();
        pool.append(other_pool);
        rejected.append(&mut other_rejected);
        non_free.append(&mut other_non_free);
        let mut rebuilt = Self::build(pool, &config, event.as_ref())?;
        rejected.append(&mut rebuilt.rejected_duplicates);
        non_free.append(&mut rebuilt.non_free_field);
        rebuilt.rejected_duplicates = rejected;
        rebuilt.non_free_field = non_free;
        Ok(rebuilt)
    }

    fn into_pool(self) -> (RecordPool, Vec<ChannelRecord>, Vec<ChannelRecord>) {
        (
            RecordPool::from_streams(self.streams),
            self.rejected_duplicates,
            self.non_free_field,
        )
    }

    /// Flatten back to a record pool; set-aside records are not included
    pub fn into_records(self) -> Vec<ChannelRecord> {
        self.streams
            .into_iter()
            .flat_map(InstrumentStream::into_records)
            .collect()
    }

    /// Multi-line listing of every stream and its records
    pub fn describe(&self) -> String {
        let mut lines = vec![format!(
            "{} instrument stream(s) in collection:",
            self.streams.len()
        )];
        for stream in &self.streams {
            for line in stream.to_string().lines() {
                lines.push(format!("{}{}", INDENT, line));
            }
        }
        lines.join("\n")
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a InstrumentStream;
    type IntoIter = std::slice::Iter<'a, InstrumentStream>;

    fn into_iter(self) -> Self::IntoIter {
        self.streams.iter()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} instrument stream(s) in collection:", self.len())?;
        writeln!(f, "    {} instrument stream(s) passed checks.", self.n_passed())?;
        write!(f, "    {} instrument stream(s) failed checks.", self.n_failed())
    }
}
