//! Engine configuration
//!
//! One `EngineConfig` value is passed explicitly to every entry point. It is
//! loaded from TOML (see [`seiscol_common::config`]) or built in code, and is
//! never read from shared state.
//!
//! ```toml
//! [grouping]
//! drop_non_free_field = true
//! handle_duplicates = true
//! networks_using_location = ["RE"]
//!
//! [duplicate]
//! max_dist_tolerance = 500.0
//! preference_order = ["process_level", "source_format", "starttime", "npts", "sampling_rate", "location_code"]
//! process_level_preference = ["V1", "V0", "V2"]
//! format_preference = ["cosmos", "dmg"]
//!
//! [colocated]
//! enabled = true
//! preference = ["HN?", "BN?", "HH?", "BH?"]
//!
//! [colocated.large_dist]
//! enabled = false
//! preference = ["HH?", "BH?", "HN?", "BN?"]
//! mag = [3.0, 5.0]
//! dist = [100.0, 200.0]
//! ```

use crate::error::{Error, Result};
use crate::pattern;
use crate::record::ProcessLevel;
use seiscol_common::config::{self as common_config, ConfigResolver, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub grouping: GroupingConfig,

    #[serde(default)]
    pub duplicate: DuplicateConfig,

    #[serde(default)]
    pub colocated: ColocationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which records enter grouping and how streams are split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Set aside records that are not free-field before grouping
    #[serde(default = "default_true")]
    pub drop_non_free_field: bool,

    /// Run duplicate resolution before grouping
    #[serde(default = "default_true")]
    pub handle_duplicates: bool,

    /// Networks whose location code distinguishes separate sensors
    #[serde(default = "default_networks_using_location")]
    pub networks_using_location: Vec<String>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            drop_non_free_field: true,
            handle_duplicates: true,
            networks_using_location: default_networks_using_location(),
        }
    }
}

/// Tie-break criteria for duplicate records, applied in configured order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceCriterion {
    /// Rank in `process_level_preference`
    ProcessLevel,
    /// Rank in `format_preference` (only when both formats are listed)
    SourceFormat,
    /// Prefer records that do not start at the epoch
    #[serde(rename = "starttime", alias = "start_time")]
    StartTime,
    /// Prefer more samples
    Npts,
    /// Prefer higher sampling rate
    SamplingRate,
    /// Prefer a non-blank, then lexically smaller location code
    LocationCode,
}

impl fmt::Display for PreferenceCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PreferenceCriterion::ProcessLevel => "process_level",
            PreferenceCriterion::SourceFormat => "source_format",
            PreferenceCriterion::StartTime => "starttime",
            PreferenceCriterion::Npts => "npts",
            PreferenceCriterion::SamplingRate => "sampling_rate",
            PreferenceCriterion::LocationCode => "location_code",
        };
        f.write_str(name)
    }
}

/// Duplicate detection and resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateConfig {
    /// Records of the same station/instrument/orientation closer than this
    /// many meters are duplicates
    #[serde(default = "default_max_dist_tolerance")]
    pub max_dist_tolerance: f64,

    #[serde(default = "default_preference_order")]
    pub preference_order: Vec<PreferenceCriterion>,

    /// Most preferred first
    #[serde(default = "default_process_level_preference")]
    pub process_level_preference: Vec<ProcessLevel>,

    /// Most preferred first; formats not listed are not ranked
    #[serde(default = "default_format_preference")]
    pub format_preference: Vec<String>,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            max_dist_tolerance: default_max_dist_tolerance(),
            preference_order: default_preference_order(),
            process_level_preference: default_process_level_preference(),
            format_preference: default_format_preference(),
        }
    }
}

/// Colocated instrument selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColocationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Channel patterns, most preferred first
    #[serde(default = "default_colocated_preference")]
    pub preference: Vec<String>,

    /// Alternative preference for stations far from the event
    #[serde(default)]
    pub large_dist: Option<LargeDistanceConfig>,
}

impl Default for ColocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preference: default_colocated_preference(),
            large_dist: None,
        }
    }
}

/// Distance-dependent preference override.
///
/// `mag` and `dist` are paired thresholds; `dist` is in kilometers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeDistanceConfig {
    #[serde(default)]
    pub enabled: bool,
    pub preference: Vec<String>,
    pub mag: Vec<f64>,
    pub dist: Vec<f64>,
}

impl LargeDistanceConfig {
    /// Distance threshold (km) for an event of `magnitude`.
    ///
    /// Starts from the first distance and moves to the distance of every
    /// magnitude threshold the event exceeds, so with ascending `mag` the
    /// largest exceeded threshold decides. `None` when `dist` is empty.
    pub fn threshold_km(&self, magnitude: f64) -> Option<f64> {
        let mut threshold = *self.dist.first()?;
        for (m, d) in self.mag.iter().zip(&self.dist) {
            if magnitude > *m {
                threshold = *d;
            }
        }
        Some(threshold)
    }
}

fn default_true() -> bool {
    true
}

fn default_networks_using_location() -> Vec<String> {
    vec!["RE".to_string()]
}

fn default_max_dist_tolerance() -> f64 {
    500.0
}

fn default_preference_order() -> Vec<PreferenceCriterion> {
    vec![
        PreferenceCriterion::ProcessLevel,
        PreferenceCriterion::SourceFormat,
        PreferenceCriterion::StartTime,
        PreferenceCriterion::Npts,
        PreferenceCriterion::SamplingRate,
        PreferenceCriterion::LocationCode,
    ]
}

fn default_process_level_preference() -> Vec<ProcessLevel> {
    vec![ProcessLevel::V1, ProcessLevel::V0, ProcessLevel::V2]
}

fn default_format_preference() -> Vec<String> {
    vec!["cosmos".to_string(), "dmg".to_string()]
}

fn default_colocated_preference() -> Vec<String> {
    ["HN?", "BN?", "HH?", "BH?"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = common_config::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the resolved config file (explicit path, `SEISCOL_CONFIG`,
    /// user config dir), falling back to defaults when none exists.
    pub fn load(resolver: &ConfigResolver, explicit: Option<&Path>) -> Result<Self> {
        let config: EngineConfig = common_config::load_or_default(resolver, explicit)?;
        config.validate()?;
        info!(
            "Engine config: handle_duplicates={}, drop_non_free_field={}, colocated={}",
            config.grouping.handle_duplicates,
            config.grouping.drop_non_free_field,
            config.colocated.enabled
        );
        Ok(config)
    }

    /// Reject values the engine cannot act on
    pub fn validate(&self) -> Result<()> {
        let tolerance = self.duplicate.max_dist_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::Config(format!(
                "duplicate.max_dist_tolerance must be a non-negative number of meters (got {})",
                tolerance
            )));
        }

        if self.colocated.enabled && self.colocated.preference.is_empty() {
            return Err(Error::Config(
                "colocated.preference must list at least one instrument pattern".to_string(),
            ));
        }
        for p in &self.colocated.preference {
            pattern::compile(p)?;
        }

        if let Some(large) = &self.colocated.large_dist {
            if large.mag.len() != large.dist.len() {
                return Err(Error::Config(format!(
                    "colocated.large_dist.mag has {} entries but dist has {}",
                    large.mag.len(),
                    large.dist.len()
                )));
            }
            if large.enabled && (large.dist.is_empty() || large.preference.is_empty()) {
                return Err(Error::Config(
                    "colocated.large_dist needs preference, mag and dist when enabled".to_string(),
                ));
            }
            for p in &large.preference {
                pattern::compile(p)?;
            }
        }

        Ok(())
    }
}
