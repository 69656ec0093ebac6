//! Duplicate record detection and resolution
//!
//! Two records are duplicates when they share an orientation class and
//! either
//! - their `network.station.location.channel` ids differ at most in the
//!   final character, or
//! - station and instrument code match and they are closer than
//!   `max_dist_tolerance` meters.
//!
//! Candidate pairs are found per station and linked into connected
//! components. Within a component, records are visited in input order
//! against an accepted set: a record that duplicates an accepted record is
//! tie-broken against it, any other record joins the accepted set. The
//! distance rule is not transitive, so a component may keep several records.

use crate::config::{DuplicateConfig, PreferenceCriterion};
use crate::pool::{PooledRecord, RecordPool};
use crate::record::{ChannelRecord, BLANK_LOCATION};
use crate::union_find::DisjointSet;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

const MODULE: &str = "duplicates";

/// Outcome of a tie-break between two duplicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preferred {
    Candidate,
    Accepted,
}

fn without_last_char(id: &str) -> &str {
    match id.char_indices().last() {
        Some((i, _)) => &id[..i],
        None => id,
    }
}

/// Whether `a` and `b` record the same motion from the same sensor
pub fn are_duplicates(a: &ChannelRecord, b: &ChannelRecord, max_dist_tolerance: f64) -> bool {
    if a.orientation() != b.orientation() {
        return false;
    }
    if without_last_char(&a.id()) == without_last_char(&b.id()) {
        return true;
    }
    a.station() == b.station()
        && a.instrument_code() == b.instrument_code()
        && a.coordinates().distance_to(b.coordinates()) < max_dist_tolerance
}

/// Rank of `item` in `list` (lower is better); unlisted items rank last
fn rank<T: PartialEq>(list: &[T], item: &T) -> usize {
    list.iter().position(|x| x == item).unwrap_or(list.len())
}

/// Ordering of `candidate` against `accepted` under one criterion.
///
/// `Less` means the candidate is preferred. `None` means the criterion does
/// not apply to this pair.
fn compare(
    criterion: PreferenceCriterion,
    candidate: &ChannelRecord,
    accepted: &ChannelRecord,
    config: &DuplicateConfig,
) -> Option<Ordering> {
    match criterion {
        PreferenceCriterion::ProcessLevel => {
            let levels = &config.process_level_preference;
            Some(rank(levels, &candidate.process_level()).cmp(&rank(levels, &accepted.process_level())))
        }
        PreferenceCriterion::SourceFormat => {
            let formats = &config.format_preference;
            let c = formats.iter().position(|f| f == candidate.source_format())?;
            let a = formats.iter().position(|f| f == accepted.source_format())?;
            Some(c.cmp(&a))
        }
        // false sorts first: a real start time beats the epoch placeholder
        PreferenceCriterion::StartTime => {
            Some(candidate.starts_at_epoch().cmp(&accepted.starts_at_epoch()))
        }
        PreferenceCriterion::Npts => Some(accepted.npts().cmp(&candidate.npts())),
        PreferenceCriterion::SamplingRate => accepted
            .sampling_rate()
            .partial_cmp(&candidate.sampling_rate()),
        PreferenceCriterion::LocationCode => {
            let c = candidate.location();
            let a = accepted.location();
            match (c == BLANK_LOCATION, a == BLANK_LOCATION) {
                (true, true) => Some(Ordering::Equal),
                (false, true) => Some(Ordering::Less),
                (true, false) => Some(Ordering::Greater),
                (false, false) => Some(c.cmp(a)),
            }
        }
    }
}

/// Decide between a `candidate` and the currently `accepted` duplicate.
///
/// The first configured criterion that tells them apart decides. When none
/// does, the accepted record stays.
pub fn choose_preferred(
    candidate: &ChannelRecord,
    accepted: &ChannelRecord,
    config: &DuplicateConfig,
) -> Preferred {
    for criterion in &config.preference_order {
        match compare(*criterion, candidate, accepted, config) {
            Some(Ordering::Less) => {
                debug!(
                    "{} preferred over {} on {}",
                    candidate.id(),
                    accepted.id(),
                    criterion
                );
                return Preferred::Candidate;
            }
            Some(Ordering::Greater) => return Preferred::Accepted,
            Some(Ordering::Equal) | None => continue,
        }
    }
    Preferred::Accepted
}

/// Indices of surviving records and of each loser with its winner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// In input order
    pub survivors: Vec<usize>,
    /// `(loser, winner)` pairs, in loser input order
    pub rejected: Vec<(usize, usize)>,
}

/// Removes redundant records before grouping
#[derive(Debug, Clone)]
pub struct DuplicateResolver<'a> {
    config: &'a DuplicateConfig,
}

impl<'a> DuplicateResolver<'a> {
    pub fn new(config: &'a DuplicateConfig) -> Self {
        Self { config }
    }

    /// Work out which of `records` survive. Records are not modified.
    pub fn resolve(&self, records: &[ChannelRecord]) -> Resolution {
        let refs: Vec<&ChannelRecord> = records.iter().collect();
        self.resolve_refs(&refs)
    }

    fn resolve_refs(&self, records: &[&ChannelRecord]) -> Resolution {
        let mut sets = DisjointSet::new(records.len());

        // Both duplicate rules need equal station codes
        let mut by_station: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            by_station.entry(record.station()).or_default().push(i);
        }
        for members in by_station.values() {
            for (n, &i) in members.iter().enumerate() {
                for &j in &members[n + 1..] {
                    if are_duplicates(records[i], records[j], self.config.max_dist_tolerance) {
                        sets.union(i, j);
                    }
                }
            }
        }

        let mut resolution = Resolution::default();
        for component in sets.components() {
            let mut accepted: Vec<usize> = Vec::with_capacity(1);
            for &candidate in &component {
                let matched = accepted.iter().position(|&a| {
                    are_duplicates(records[candidate], records[a], self.config.max_dist_tolerance)
                });
                let Some(slot) = matched else {
                    accepted.push(candidate);
                    continue;
                };
                let current = accepted[slot];
                match choose_preferred(records[candidate], records[current], self.config) {
                    Preferred::Candidate => {
                        accepted[slot] = candidate;
                        resolution.rejected.push((current, candidate));
                    }
                    Preferred::Accepted => resolution.rejected.push((candidate, current)),
                }
            }
            resolution.survivors.extend(accepted);
        }
        resolution.survivors.sort_unstable();
        resolution.rejected.sort_unstable();
        resolution
    }

    /// Resolve a pool, returning the survivors and the failed losers
    pub fn resolve_pool(&self, pool: RecordPool) -> (RecordPool, Vec<ChannelRecord>) {
        let (entries, table) = pool.into_parts();
        let resolution = {
            let refs: Vec<&ChannelRecord> = entries.iter().map(|e| &e.record).collect();
            self.resolve_refs(&refs)
        };
        if resolution.rejected.is_empty() {
            return (RecordPool::from_parts(entries, table), Vec::new());
        }

        let reasons: HashMap<usize, String> = resolution
            .rejected
            .iter()
            .map(|&(loser, winner)| {
                let w = &entries[winner].record;
                (loser, format!("Duplicate of {} ({})", w.id(), w.source_file()))
            })
            .collect();

        let mut survivors: Vec<PooledRecord> = Vec::with_capacity(resolution.survivors.len());
        let mut rejected = Vec::with_capacity(reasons.len());
        for (i, mut entry) in entries.into_iter().enumerate() {
            match reasons.get(&i) {
                Some(reason) => {
                    info!(
                        "Record {} ({}) is a duplicate and has been removed from the collection",
                        entry.record.id(),
                        entry.record.source_file()
                    );
                    entry.record.fail(MODULE, reason.as_str());
                    rejected.push(entry.record);
                }
                None => survivors.push(entry),
            }
        }
        (RecordPool::from_parts(survivors, table), rejected)
    }
}
