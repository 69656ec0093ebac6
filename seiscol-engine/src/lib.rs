//! # seiscol engine
//!
//! Consolidates per-channel waveform records into validated, deduplicated
//! instrument streams:
//! - Record model and provenance log
//! - Time-base alignment (trim, then Lanczos interpolation)
//! - Duplicate resolution with configurable tie-breaks
//! - Grouping into instrument streams
//! - Colocated instrument selection
//! - Collection query surface (selection, status summaries)
//!
//! Data-quality problems never abort a build; they mark records failed with a
//! reason. Only structural problems are returned as [`Error`].

pub mod alignment;
pub mod array;
pub mod collection;
pub mod colocation;
pub mod config;
pub mod dedup;
pub mod error;
pub mod grouping;
pub mod pattern;
pub mod pool;
pub mod provenance;
pub mod record;
pub mod resample;
pub mod status;
pub mod stream;
pub mod union_find;

pub use array::StreamArray;
pub use collection::Collection;
pub use colocation::{ColocationSelector, EventOrigin};
pub use config::EngineConfig;
pub use dedup::DuplicateResolver;
pub use error::{Error, Result};
pub use grouping::Grouper;
pub use pool::RecordPool;
pub use provenance::{Provenance, ProvenanceEntry};
pub use record::{ChannelRecord, ProcessLevel, RecordHeader};
pub use status::{StatusGranularity, StatusReport};
pub use stream::{GroupingMode, InstrumentStream};
