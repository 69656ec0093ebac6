//! Time-base alignment of the records destined for one instrument stream
//!
//! Escalates from the least invasive fix to the most:
//! 1. Records already share start and end times, or already agree on
//!    rate, length and start to within half a sample: nothing to do.
//! 2. Trim every record to the common overlap window.
//! 3. If trimming leaves a rate or phase mismatch, resample every record onto
//!    a common grid at the finest input sample interval.
//!
//! An empty overlap window fails every record instead of touching its samples.

use crate::provenance::{Cut, Interpolation, InterpolationMethod, ProvenanceEntry};
use crate::record::ChannelRecord;
use crate::resample::{lanczos_interpolate, Grid, LANCZOS_HALF_WIDTH};
use chrono::{DateTime, Utc};
use seiscol_common::time::{self, format_timestamp};
use tracing::debug;

const MODULE: &str = "alignment";

/// Relative tolerance when comparing sample rates
const RATE_TOLERANCE: f64 = 1e-9;

/// Slack when counting whole samples in a window, in units of samples
const NPTS_EPSILON: f64 = 1e-6;

/// Reason recorded when the overlap window is empty
pub const EMPTY_WINDOW_REASON: &str =
    "Trimming start/end times across records for this stream resulted in a start time after the end time.";

/// What alignment had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentOutcome {
    /// Records were already aligned
    Unchanged,
    /// Trimming to the overlap window was enough
    Trimmed,
    /// Trimming was followed by resampling onto a common grid
    Interpolated,
    /// No overlap; every record was marked failed
    WindowFailed,
}

/// Whether two sample rates are equal within floating-point noise
pub fn rates_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= RATE_TOLERANCE * a.abs().max(b.abs())
}

/// Whether two start times agree to within half of the sample interval `delta`
pub fn starts_match(a: DateTime<Utc>, b: DateTime<Utc>, delta: f64) -> bool {
    time::seconds_between(a, b).abs() < delta / 2.0
}

/// Same rate, same sample count, and starts within half a sample
pub fn is_consistent(records: &[ChannelRecord]) -> bool {
    let Some(first) = records.first() else {
        return true;
    };
    let min_delta = min_delta(records);
    records.iter().all(|r| {
        rates_match(r.sampling_rate(), first.sampling_rate())
            && r.npts() == first.npts()
            && starts_match(r.start_time(), first.start_time(), min_delta)
    })
}

fn min_delta(records: &[ChannelRecord]) -> f64 {
    records
        .iter()
        .map(|r| r.delta())
        .fold(f64::INFINITY, f64::min)
}

fn times_match_exactly(records: &[ChannelRecord]) -> bool {
    let Some(first) = records.first() else {
        return true;
    };
    let (start, end) = (first.start_time(), first.end_time());
    records
        .iter()
        .all(|r| r.start_time() == start && r.end_time() == end)
}

/// Overlap window `[max(starts), min(ends)]` (None for an empty slice)
pub fn overlap_window(records: &[ChannelRecord]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = records.iter().map(|r| r.start_time()).max()?;
    let end = records.iter().map(|r| r.end_time()).min()?;
    Some((start, end))
}

/// Align `records` in place. Provenance is appended to every touched record.
pub fn align_records(records: &mut [ChannelRecord]) -> AlignmentOutcome {
    if records.len() < 2 || times_match_exactly(records) {
        return AlignmentOutcome::Unchanged;
    }
    // Trimmed records keep their own sample grids, so a rebuilt stream lands here
    if is_consistent(records) {
        return AlignmentOutcome::Unchanged;
    }

    let Some((new_start, new_end)) = overlap_window(records) else {
        return AlignmentOutcome::Unchanged;
    };

    if new_start >= new_end {
        debug!(
            "Empty overlap window {} - {}; failing {} records",
            format_timestamp(new_start),
            format_timestamp(new_end),
            records.len()
        );
        for record in records.iter_mut() {
            record.push_provenance(ProvenanceEntry::Cut(Cut {
                new_start_time: new_start,
                new_end_time: new_end,
            }));
            record.fail(MODULE, EMPTY_WINDOW_REASON);
        }
        return AlignmentOutcome::WindowFailed;
    }

    // Cutting is the least invasive option, so try it first
    for record in records.iter_mut() {
        record.trim(new_start, new_end);
        record.push_provenance(ProvenanceEntry::Cut(Cut {
            new_start_time: new_start,
            new_end_time: new_end,
        }));
    }

    if is_consistent(records) {
        debug!(
            "Aligned {} records by trimming to {} - {}",
            records.len(),
            format_timestamp(new_start),
            format_timestamp(new_end)
        );
        return AlignmentOutcome::Trimmed;
    }

    interpolate_to_common_grid(records);
    AlignmentOutcome::Interpolated
}

fn interpolate_to_common_grid(records: &mut [ChannelRecord]) {
    let new_delta = min_delta(records);
    // Trimming can leave sub-sample offsets, so recompute the window
    let Some((grid_start, grid_end)) = overlap_window(records) else {
        return;
    };
    let duration = time::seconds_between(grid_end, grid_start).max(0.0);
    let new_npts = (duration / new_delta + 1.0 + NPTS_EPSILON).floor() as usize;
    let new_rate = 1.0 / new_delta;

    debug!(
        "Interpolating {} records onto {} samples at {:.3} Hz from {}",
        records.len(),
        new_npts,
        new_rate,
        format_timestamp(grid_start)
    );

    for record in records.iter_mut() {
        let grid = Grid {
            input_delta: record.delta(),
            output_delta: new_delta,
            offset: time::seconds_between(grid_start, record.start_time()),
            npts: new_npts,
        };
        let resampled = lanczos_interpolate(record.data(), grid, LANCZOS_HALF_WIDTH);
        record.replace_samples(resampled, grid_start, new_rate);
        record.push_provenance(ProvenanceEntry::Interpolate(Interpolation {
            interpolation_method: InterpolationMethod::Lanczos,
            new_number_of_samples: new_npts,
            new_start_time: grid_start,
            a: LANCZOS_HALF_WIDTH,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordHeader;
    use seiscol_common::time::from_epoch_seconds;

    fn record(channel: &str, start: f64, rate: f64, npts: usize) -> ChannelRecord {
        let header = RecordHeader {
            network: "CI".to_string(),
            station: "ABCD".to_string(),
            channel: channel.to_string(),
            sampling_rate: rate,
            start_time: from_epoch_seconds(start),
            ..Default::default()
        };
        let data = (0..npts).map(|i| (i as f64 * 0.05).sin()).collect();
        ChannelRecord::new(header, data).unwrap()
    }

    #[test]
    fn test_matching_records_untouched() {
        let mut records = vec![
            record("HN1", 100.0, 100.0, 500),
            record("HN2", 100.0, 100.0, 500),
        ];
        assert_eq!(align_records(&mut records), AlignmentOutcome::Unchanged);
        assert!(records.iter().all(|r| r.provenance().is_empty()));
    }

    #[test]
    fn test_single_record_untouched() {
        let mut records = vec![record("HNZ", 0.0, 100.0, 10)];
        assert_eq!(align_records(&mut records), AlignmentOutcome::Unchanged);
    }

    #[test]
    fn test_uneven_lengths_trimmed_to_shortest() {
        let mut records = vec![
            record("HN1", 100.0, 100.0, 1000),
            record("HN2", 100.0, 100.0, 1001),
            record("HNZ", 100.0, 100.0, 1002),
        ];
        assert_eq!(align_records(&mut records), AlignmentOutcome::Trimmed);
        assert!(records.iter().all(|r| r.npts() == 1000));
        assert!(records.iter().all(|r| r.provenance().cuts().count() == 1));
    }

    #[test]
    fn test_subsample_offset_trimmed_without_interpolation() {
        let mut records = vec![
            record("HN1", 100.0, 100.0, 1001),
            record("HN2", 100.004, 100.0, 1000),
        ];
        assert_eq!(align_records(&mut records), AlignmentOutcome::Trimmed);
        for r in &records {
            assert!(r.provenance().contains("cut"));
            assert!(!r.provenance().contains("interpolate"));
            assert!(r.passed());
        }
        assert!(records.iter().all(|r| r.npts() == 1000));
    }

    #[test]
    fn test_aligned_within_half_sample_left_alone() {
        let mut records = vec![
            record("HN1", 100.0, 100.0, 1000),
            record("HN2", 100.004, 100.0, 1000),
        ];
        assert_eq!(align_records(&mut records), AlignmentOutcome::Unchanged);
        assert!(records.iter().all(|r| r.provenance().is_empty()));
    }

    #[test]
    fn test_rate_mismatch_interpolated() {
        let mut records = vec![
            record("HN1", 100.0, 100.0, 1000),
            record("HN2", 100.0, 50.0, 500),
        ];
        assert_eq!(align_records(&mut records), AlignmentOutcome::Interpolated);
        for r in &records {
            assert!(rates_match(r.sampling_rate(), 100.0));
            assert_eq!(r.npts(), records[0].npts());
            let interp = r.provenance().interpolations().next().unwrap();
            assert_eq!(interp.a, LANCZOS_HALF_WIDTH);
            assert_eq!(interp.interpolation_method, InterpolationMethod::Lanczos);
            assert_eq!(interp.new_number_of_samples, r.npts());
        }
        assert!(is_consistent(&records));
    }

    #[test]
    fn test_disjoint_windows_fail_every_record() {
        let mut records = vec![
            record("HN1", 100.0, 100.0, 100),
            record("HN2", 200.0, 100.0, 100),
        ];
        let before: Vec<usize> = records.iter().map(|r| r.npts()).collect();
        assert_eq!(align_records(&mut records), AlignmentOutcome::WindowFailed);
        for (r, npts) in records.iter().zip(before) {
            assert_eq!(r.npts(), npts);
            assert!(r.failure().unwrap().reason.contains("start time after the end time"));
            assert_eq!(r.provenance().cuts().count(), 1);
        }
    }
}
