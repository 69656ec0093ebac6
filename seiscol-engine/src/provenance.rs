//! Per-record processing provenance
//!
//! Every operation that changes a record's samples or time base appends one
//! entry. Entries are never rewritten or removed. Activity names and codes
//! follow the SEIS-PROV activity vocabulary so export collaborators can map
//! entries without string-keyed lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Record trimmed to a new time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    pub new_start_time: DateTime<Utc>,
    pub new_end_time: DateTime<Utc>,
}

/// Interpolation kernel used when resampling onto a common grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    Lanczos,
}

/// Record resampled onto a new time grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpolation {
    pub interpolation_method: InterpolationMethod,
    pub new_number_of_samples: usize,
    pub new_start_time: DateTime<Utc>,
    /// Kernel half-width in input samples
    pub a: usize,
}

/// Unit conversion applied when promoting raw data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRemoval {
    pub input_units: String,
    pub output_units: String,
}

/// Any activity recorded by an external collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// One provenance log entry.
///
/// Serialises as `{"prov_id": "...", "prov_attributes": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "prov_id", content = "prov_attributes", rename_all = "snake_case")]
pub enum ProvenanceEntry {
    Cut(Cut),
    Interpolate(Interpolation),
    RemoveResponse(ResponseRemoval),
    Other(Activity),
}

impl ProvenanceEntry {
    /// SEIS-PROV activity name
    pub fn activity_name(&self) -> &str {
        match self {
            ProvenanceEntry::Cut(_) => "cut",
            ProvenanceEntry::Interpolate(_) => "interpolate",
            ProvenanceEntry::RemoveResponse(_) => "remove_response",
            ProvenanceEntry::Other(activity) => &activity.name,
        }
    }

    /// Two-letter SEIS-PROV activity code
    pub fn activity_code(&self) -> &'static str {
        match self {
            ProvenanceEntry::Cut(_) => "ct",
            ProvenanceEntry::Interpolate(_) => "ip",
            ProvenanceEntry::RemoveResponse(_) => "rr",
            ProvenanceEntry::Other(_) => "ot",
        }
    }
}

/// Append-only provenance log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provenance {
    entries: Vec<ProvenanceEntry>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: ProvenanceEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProvenanceEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ProvenanceEntry> {
        self.entries.last()
    }

    /// Activity names in the order they were applied
    pub fn activity_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.activity_name()).collect()
    }

    pub fn contains(&self, activity: &str) -> bool {
        self.entries.iter().any(|e| e.activity_name() == activity)
    }

    pub fn cuts(&self) -> impl Iterator<Item = &Cut> {
        self.entries.iter().filter_map(|e| match e {
            ProvenanceEntry::Cut(cut) => Some(cut),
            _ => None,
        })
    }

    pub fn interpolations(&self) -> impl Iterator<Item = &Interpolation> {
        self.entries.iter().filter_map(|e| match e {
            ProvenanceEntry::Interpolate(interp) => Some(interp),
            _ => None,
        })
    }

    pub fn response_removals(&self) -> impl Iterator<Item = &ResponseRemoval> {
        self.entries.iter().filter_map(|e| match e {
            ProvenanceEntry::RemoveResponse(rr) => Some(rr),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a Provenance {
    type Item = &'a ProvenanceEntry;
    type IntoIter = std::slice::Iter<'a, ProvenanceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
