//! Per-concern settings sections of the pipeline configuration
//!
//! Each section maps to one table of the TOML file:
//!
//! - [`LogSettings`] - `[log]`, the rotating data log
//! - [`CacheSettings`] - `[cache]`, the in-memory window
//! - [`DashboardSettings`] - `[dashboard]`, dashboard queries and live feed
//! - [`PublishSettings`] - `[publish]`, the pub/sub publisher
//!
//! A missing table or field falls back to its default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{Result, SensorlineError};
use crate::session::DEFAULT_FLUSH_EVERY;

/// Default prefix of data log file names
pub const DEFAULT_LOG_PREFIX: &str = "sensorline";

/// Data log settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Directory for log files; no data log when unset
    pub data_dir: Option<PathBuf>,

    /// File name prefix
    pub prefix: String,

    /// Readings between flushes
    pub flush_every: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            prefix: DEFAULT_LOG_PREFIX.to_string(),
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

impl LogSettings {
    /// Whether a data log is written at all
    pub fn enabled(&self) -> bool {
        self.data_dir.is_some()
    }
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Samples kept per sensor
    pub capacity: usize,

    /// Recording to warm the cache from at startup
    pub preload: Option<PathBuf>,

    /// Readings per sensor taken from the preload recording
    pub preload_count: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            preload: None,
            preload_count: 3600,
        }
    }
}

/// Dashboard settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Directory with the dashboard's static assets
    pub assets: PathBuf,

    /// Seconds of data per live feed batch
    pub refresh_secs: f64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            assets: PathBuf::from("dashboard"),
            refresh_secs: 1.0,
        }
    }
}

/// Where published records go
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishTarget {
    /// Standard output
    #[default]
    Stdout,
    /// Append to a file
    File(PathBuf),
}

/// Publisher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Channel name every record is published on
    pub channel: String,

    /// Output target
    pub target: PublishTarget,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            channel: "sensorline".to_string(),
            target: PublishTarget::Stdout,
        }
    }
}

/// Convert seconds from the config file into a `Duration`
///
/// Saturates instead of panicking; [`duration_secs`] is the checked form
/// used during validation.
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// Convert a named setting into a non-zero `Duration`
pub fn duration_secs(name: &str, value: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        Ok(_) => Err(SensorlineError::Config(format!(
            "{} = {} is shorter than a nanosecond",
            name, value
        ))),
        Err(e) => Err(SensorlineError::Config(format!(
            "{} = {} is not a usable duration: {}",
            name, value, e
        ))),
    }
}
