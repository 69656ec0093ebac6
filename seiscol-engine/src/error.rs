//! Error types for seiscol-engine
//!
//! Only structural problems are errors. Data-quality problems are recorded on
//! the affected records as failures and never abort a build.

use thiserror::Error;

/// Main error type for the consolidation engine
#[derive(Error, Debug)]
pub enum Error {
    /// Shared infrastructure error (config loading, I/O)
    #[error(transparent)]
    Common(#[from] seiscol_common::Error),

    /// A record could not be constructed from the supplied header or trace
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Members of a manually assembled stream disagree on the stream identity
    #[error("Inconsistent stream ID for different records: expected {expected}, found {found}")]
    InconsistentStreamId { expected: String, found: String },

    /// An instrument stream needs at least one record
    #[error("Cannot build an instrument stream from zero records")]
    EmptyStream,

    /// Status summary requested at an unknown granularity
    #[error("Status must be \"short\", \"net\", or \"long\" (got \"{0}\")")]
    UnsupportedGranularity(String),

    /// Malformed glob pattern in a selection or preference list
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Streams in one collection carry different tag labels
    #[error("Only one label allowed within a collection (found {0:?})")]
    InconsistentLabels(Vec<String>),

    /// Stream parameter lookup by unknown key
    #[error("Parameter {0} not found in instrument stream")]
    ParameterNotFound(String),

    /// Engine configuration failed validation
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
