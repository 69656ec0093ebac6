//! Colocated instrument selection
//!
//! When several instruments record at one station, only the most preferred
//! one is kept for downstream computation. The others are marked failed with
//! a reason naming the instrument that was kept.

use crate::config::ColocationConfig;
use crate::error::Result;
use crate::pattern;
use crate::stream::InstrumentStream;
use crate::union_find::DisjointSet;
use glob::Pattern;
use seiscol_common::geo::great_circle_distance_km;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

const MODULE: &str = "colocation";

/// Reason recorded when no preference entry matches any stream of a station
pub const NO_PREFERENCE_MATCH_REASON: &str =
    "No instruments match entries in the colocated instrument preference list for this station.";

/// Event hypocenter summary needed for distance-dependent preferences
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventOrigin {
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: f64,
}

/// Demotes all but one instrument per station
#[derive(Debug, Clone)]
pub struct ColocationSelector<'a> {
    config: &'a ColocationConfig,
}

impl<'a> ColocationSelector<'a> {
    pub fn new(config: &'a ColocationConfig) -> Self {
        Self { config }
    }

    /// Apply colocation selection to `streams` in place.
    ///
    /// Streams that have already failed take no part. `event` is only
    /// consulted when a large-distance override is enabled.
    pub fn apply(&self, streams: &mut [InstrumentStream], event: Option<&EventOrigin>) -> Result<()> {
        let preference = compile_all(&self.config.preference)?;
        let large_dist = match &self.config.large_dist {
            Some(large) if large.enabled => match event {
                Some(origin) => large
                    .threshold_km(origin.magnitude)
                    .map(|threshold| (threshold, origin, &large.preference)),
                None => {
                    warn!("Large-distance colocation preference is enabled but no event was given; using the default preference");
                    None
                }
            },
            _ => None,
        };
        let large_preference = match large_dist {
            Some((_, _, patterns)) => Some(compile_all(patterns)?),
            None => None,
        };

        for group in colocated_groups(streams) {
            if group.len() < 2 {
                continue;
            }

            let mut effective = &preference;
            if let (Some((threshold, origin, _)), Some(large)) = (large_dist, &large_preference) {
                let coords = streams[group[0]].records()[0].coordinates();
                let distance = great_circle_distance_km(
                    coords.latitude,
                    coords.longitude,
                    origin.latitude,
                    origin.longitude,
                );
                if distance > threshold {
                    debug!(
                        "{} is {:.1} km from the event (threshold {:.1} km); using large-distance preference",
                        streams[group[0]].net_sta(),
                        distance,
                        threshold
                    );
                    effective = large;
                }
            }

            select_in_group(streams, &group, effective);
        }
        Ok(())
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns.iter().map(|p| pattern::compile(p)).collect()
}

/// Passing streams grouped by `network.station`, in order of first member
fn colocated_groups(streams: &[InstrumentStream]) -> Vec<Vec<usize>> {
    let passing: Vec<usize> = (0..streams.len()).filter(|&i| streams[i].passed()).collect();
    let mut sets = DisjointSet::new(passing.len());
    let mut first_at_station: HashMap<(&str, &str), usize> = HashMap::new();
    for (slot, &i) in passing.iter().enumerate() {
        let key = (streams[i].network(), streams[i].station());
        match first_at_station.get(&key) {
            Some(&first) => {
                sets.union(first, slot);
            }
            None => {
                first_at_station.insert(key, slot);
            }
        }
    }
    sets.components()
        .into_iter()
        .map(|slots| slots.into_iter().map(|s| passing[s]).collect())
        .collect()
}

fn stream_matches(stream: &InstrumentStream, pattern: &Pattern) -> bool {
    pattern.matches(stream.instrument_code()) || stream.iter().any(|r| pattern.matches(r.channel()))
}

fn select_in_group(streams: &mut [InstrumentStream], group: &[usize], preference: &[Pattern]) {
    let keep = preference
        .iter()
        .find_map(|p| group.iter().copied().find(|&i| stream_matches(&streams[i], p)));

    match keep {
        Some(keep) => {
            let inst = streams[keep].instrument_code().to_string();
            debug!(
                "Keeping {} among {} colocated streams",
                streams[keep].id(),
                group.len()
            );
            let reason = format!("Colocated with {} instrument.", inst);
            for &i in group.iter().filter(|&&i| i != keep) {
                streams[i].fail_all(MODULE, &reason);
            }
        }
        None => {
            for &i in group {
                streams[i].fail_all(MODULE, NO_PREFERENCE_MATCH_REASON);
            }
        }
    }
}
