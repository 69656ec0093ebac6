//! Partition a record pool into instrument streams
//!
//! Records belong together when network, station, instrument code and
//! free-field classification all match. For networks that use the location
//! code to tell sensors apart, each cluster is further split by location.

use crate::config::GroupingConfig;
use crate::error::Result;
use crate::pool::{PooledRecord, RecordPool};
use crate::stream::{GroupingMode, InstrumentStream};
use crate::union_find::DisjointSet;
use std::collections::HashMap;
use tracing::debug;

/// Builds instrument streams from a deduplicated pool
#[derive(Debug, Clone)]
pub struct Grouper<'a> {
    config: &'a GroupingConfig,
}

impl<'a> Grouper<'a> {
    pub fn new(config: &'a GroupingConfig) -> Self {
        Self { config }
    }

    fn splits_by_location(&self, network: &str) -> bool {
        self.config
            .networks_using_location
            .iter()
            .any(|n| n == network)
    }

    /// Cluster `pool` and build one stream per cluster (or per location).
    ///
    /// Streams come out in order of their first record in the pool.
    /// Parameters and tags of the streams the pool was flattened from are
    /// reattached to streams with the same identity.
    pub fn group(&self, pool: RecordPool) -> Result<Vec<InstrumentStream>> {
        let (entries, table) = pool.into_parts();

        let components = {
            let mut sets = DisjointSet::new(entries.len());
            let mut first_with_key: HashMap<(&str, &str, &str, bool), usize> = HashMap::new();
            for (i, entry) in entries.iter().enumerate() {
                let r = &entry.record;
                let key = (r.network(), r.station(), r.instrument_code(), r.free_field());
                match first_with_key.get(&key) {
                    Some(&first) => {
                        sets.union(first, i);
                    }
                    None => {
                        first_with_key.insert(key, i);
                    }
                }
            }
            sets.components()
        };

        let mut slots: Vec<Option<PooledRecord>> = entries.into_iter().map(Some).collect();
        let mut streams = Vec::with_capacity(components.len());
        for component in components {
            let members: Vec<PooledRecord> = component
                .iter()
                .filter_map(|&i| slots[i].take())
                .collect();
            for cluster in self.split(members) {
                let first_origin = cluster.first().and_then(|e| e.origin);
                let records = cluster.into_iter().map(|e| e.record).collect();
                let mut stream = InstrumentStream::new(records, GroupingMode::Instrument)?;
                table.reattach(&mut stream, first_origin);
                debug!("Grouped {} record(s) into {}", stream.len(), stream.id());
                streams.push(stream);
            }
        }
        Ok(streams)
    }

    fn split(&self, members: Vec<PooledRecord>) -> Vec<Vec<PooledRecord>> {
        let splits = members
            .first()
            .is_some_and(|e| self.splits_by_location(e.record.network()));
        if !splits {
            return vec![members];
        }

        let mut by_location: Vec<(String, Vec<PooledRecord>)> = Vec::new();
        for entry in members {
            let location = entry.record.location().to_string();
            match by_location.iter_mut().find(|(loc, _)| *loc == location) {
                Some((_, cluster)) => cluster.push(entry),
                None => by_location.push((location, vec![entry])),
            }
        }
        by_location.into_iter().map(|(_, cluster)| cluster).collect()
    }
}
