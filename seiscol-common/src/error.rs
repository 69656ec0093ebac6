//! Common error types for seiscol

use thiserror::Error;

/// Common result type for seiscol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared across seiscol crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML document could not be parsed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}
