//! # seiscol common library
//!
//! Shared infrastructure for the waveform consolidation workspace:
//! - Error type and result alias
//! - TOML configuration loading and file resolution
//! - Logging initialisation
//! - Sample-accurate timestamp arithmetic
//! - Geodesy helpers

pub mod config;
pub mod error;
pub mod geo;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
