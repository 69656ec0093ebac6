//! Pass/fail summaries of a set of instrument streams

use crate::error::{Error, Result};
use crate::stream::InstrumentStream;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Level of detail for a status summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusGranularity {
    /// Count of failed streams per failure reason
    Short,
    /// Passed/failed counts per network
    Net,
    /// Failure reason per stream (empty when passed)
    Long,
}

impl FromStr for StatusGranularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "short" => Ok(StatusGranularity::Short),
            "net" => Ok(StatusGranularity::Net),
            "long" => Ok(StatusGranularity::Long),
            other => Err(Error::UnsupportedGranularity(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStatus {
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    /// `(reason, number of streams)`, most frequent first
    Short(Vec<(String, usize)>),
    Net(BTreeMap<String, NetworkStatus>),
    /// `(stream id, reason)` in stream order
    Long(Vec<(String, String)>),
}

impl StatusReport {
    pub fn build<'a, I>(streams: I, granularity: StatusGranularity) -> Self
    where
        I: IntoIterator<Item = &'a InstrumentStream>,
    {
        match granularity {
            StatusGranularity::Short => {
                let mut counts: Vec<(String, usize)> = Vec::new();
                for reason in streams.into_iter().filter_map(|s| s.failure_reason()) {
                    match counts.iter_mut().find(|(r, _)| r == reason) {
                        Some((_, n)) => *n += 1,
                        None => counts.push((reason.to_string(), 1)),
                    }
                }
                // Stable sort keeps first-seen order among equal counts
                counts.sort_by(|a, b| b.1.cmp(&a.1));
                StatusReport::Short(counts)
            }
            StatusGranularity::Net => {
                let mut by_network: BTreeMap<String, NetworkStatus> = BTreeMap::new();
                for stream in streams {
                    let entry = by_network.entry(stream.network().to_string()).or_default();
                    if stream.passed() {
                        entry.passed += 1;
                    } else {
                        entry.failed += 1;
                    }
                }
                StatusReport::Net(by_network)
            }
            StatusGranularity::Long => StatusReport::Long(
                streams
                    .into_iter()
                    .map(|s| (s.id().to_string(), s.failure_reason().unwrap_or("").to_string()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusReport::Short(counts) => {
                write!(f, "Failure Reason\tNumber of Records")?;
                for (reason, n) in counts {
                    write!(f, "\n{}\t{}", reason, n)?;
                }
            }
            StatusReport::Net(networks) => {
                write!(f, "Network\tNumber Passed\tNumber Failed")?;
                for (net, status) in networks {
                    write!(f, "\n{}\t{}\t{}", net, status.passed, status.failed)?;
                }
            }
            StatusReport::Long(rows) => {
                write!(f, "StationID\tFailure Reason")?;
                for (id, reason) in rows {
                    write!(f, "\n{}\t{}", id, reason)?;
                }
            }
        }
        Ok(())
    }
}
