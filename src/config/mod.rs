//! Configuration module for sensorline
//!
//! This module handles pipeline configuration:
//! - Loading a TOML configuration file (all fields optional)
//! - Validation before a run is started
//! - Merging command-line overrides over the file
//!
//! # Config Location
//!
//! Without `--config`, the file is looked up in the platform-appropriate
//! location:
//! - **Linux**: `~/.config/sensorline/config.toml`
//! - **macOS**: `~/Library/Application Support/sensorline/config.toml`
//! - **Windows**: `%APPDATA%\sensorline\config.toml`
//!
//! A missing default file is not an error; defaults are used instead.
//!
//! # Example
//!
//! ```toml
//! device = "mock"
//! sensors = ["temperature", "accelerometer"]
//! interval_secs = 1.0
//! rotate_secs = 3600.0
//!
//! [log]
//! data_dir = "/var/lib/sensorline"
//!
//! [dashboard]
//! assets = "/usr/share/sensorline/dashboard"
//! refresh_secs = 2.0
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, SensorlineError};
use crate::types::{SensorKind, DEFAULT_INTERVAL_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name under the platform config directory
pub const APP_DIR: &str = "sensorline";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default device identifier
pub const DEFAULT_DEVICE: &str = "mock";

/// Shortest accepted rotation interval in seconds
pub const MIN_ROTATE_SECS: f64 = 1.0;

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Device identifier (`mock` selects the built-in mock driver)
    pub device: String,

    /// Sensors to sample, in order
    pub sensors: Vec<String>,

    /// Sampling interval in seconds
    pub interval_secs: f64,

    /// Per-poll timeout in seconds (defaults to the interval)
    pub poll_timeout_secs: Option<f64>,

    /// Rotation interval in seconds; a single cycle when unset
    pub rotate_secs: Option<f64>,

    /// Broadcast vector readings as their magnitude
    pub broadcast_magnitude: bool,

    /// Recording to replay instead of a live device
    pub replay: Option<PathBuf>,

    /// Data log settings
    pub log: LogSettings,

    /// Cache settings
    pub cache: CacheSettings,

    /// Dashboard settings; no cache and no dashboard when unset
    pub dashboard: Option<DashboardSettings>,

    /// Publisher settings; nothing is published when unset
    pub publish: Option<PublishSettings>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            sensors: SensorKind::all().iter().map(|k| k.name().to_string()).collect(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            poll_timeout_secs: None,
            rotate_secs: None,
            broadcast_magnitude: true,
            replay: None,
            log: LogSettings::default(),
            cache: CacheSettings::default(),
            dashboard: None,
            publish: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| SensorlineError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SensorlineError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load the given file, or the default file if it exists, or defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::load(path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SensorlineError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Check the config for values no run can start with
    pub fn validate(&self) -> Result<()> {
        if self.sensors.is_empty() {
            return Err(SensorlineError::Config("no sensors configured".to_string()));
        }
        if self.replay.is_none() {
            // Live sensors must come from the fixed set
            for sensor in &self.sensors {
                sensor.parse::<SensorKind>()?;
            }
        }
        for (i, sensor) in self.sensors.iter().enumerate() {
            if self.sensors[..i].contains(sensor) {
                return Err(SensorlineError::Config(format!(
                    "sensor {} listed twice",
                    sensor
                )));
            }
        }
        if self.device.trim().is_empty() && self.replay.is_none() {
            return Err(SensorlineError::Config("device must not be empty".to_string()));
        }
        positive("interval_secs", self.interval_secs)?;
        duration_secs("interval_secs", self.interval_secs)?;
        if let Some(timeout) = self.poll_timeout_secs {
            positive("poll_timeout_secs", timeout)?;
            duration_secs("poll_timeout_secs", timeout)?;
        }
        if let Some(rotate) = self.rotate_secs {
            positive("rotate_secs", rotate)?;
            duration_secs("rotate_secs", rotate)?;
            if rotate < MIN_ROTATE_SECS {
                return Err(SensorlineError::Config(format!(
                    "rotate_secs must be at least {}",
                    MIN_ROTATE_SECS
                )));
            }
        }
        if self.cache.capacity == 0 {
            return Err(SensorlineError::Config(
                "cache capacity must be at least 1".to_string(),
            ));
        }
        if let Some(dashboard) = &self.dashboard {
            positive("dashboard.refresh_secs", dashboard.refresh_secs)?;
        }
        if let Some(publish) = &self.publish {
            if publish.channel.is_empty() {
                return Err(SensorlineError::Config(
                    "publish channel must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Sampling interval
    pub fn interval(&self) -> Duration {
        secs(self.interval_secs)
    }

    /// Per-poll timeout
    pub fn poll_timeout(&self) -> Duration {
        secs(self.poll_timeout_secs.unwrap_or(self.interval_secs))
    }

    /// Rotation interval
    pub fn rotate(&self) -> Option<Duration> {
        self.rotate_secs.map(secs)
    }

    /// Whether the cache (and with it the dashboard) is enabled
    pub fn cache_enabled(&self) -> bool {
        self.dashboard.is_some()
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SensorlineError::Config(format!(
            "{} must be a positive number, got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.device, "mock");
        assert_eq!(config.sensors.len(), 5);
        assert!(config.broadcast_magnitude);
        assert_eq!(config.poll_timeout(), Duration::from_secs(1));
        assert!(config.rotate().is_none());
        assert!(!config.cache_enabled());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
sensors = ["light"]
rotate_secs = 60.0

[log]
data_dir = "/tmp/sensorline"

[dashboard]
refresh_secs = 2.5
"#,
        )
        .unwrap();
        assert_eq!(config.sensors, vec!["light"]);
        assert_eq!(config.rotate(), Some(Duration::from_secs(60)));
        assert_eq!(config.log.prefix, "sensorline");
        assert!(config.log.enabled());
        assert_eq!(config.cache.capacity, 86_400);
        let dashboard = config.dashboard.as_ref().unwrap();
        assert_eq!(dashboard.refresh_secs, 2.5);
        assert_eq!(dashboard.assets, PathBuf::from("dashboard"));
        config.validate().unwrap();
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = PipelineConfig::default();
        config.publish = Some(PublishSettings::default());
        let text = config.to_toml().unwrap();
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = PipelineConfig::default();
        config.sensors = vec!["barometer".to_string()];
        assert!(matches!(
            config.validate(),
            Err(SensorlineError::UnknownSensor(_))
        ));

        let mut config = PipelineConfig::default();
        config.interval_secs = 0.0;
        assert!(matches!(config.validate(), Err(SensorlineError::Config(_))));

        let mut config = PipelineConfig::default();
        config.sensors = vec!["light".to_string(), "light".to_string()];
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.rotate_secs = Some(0.5);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.sensors.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_durations() {
        let config = PipelineConfig {
            sensors: vec!["light".to_string()],
            rotate_secs: Some(1e20),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SensorlineError::Config(_))));

        let config = PipelineConfig {
            interval_secs: 1e-12,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SensorlineError::Config(_))));

        let config = PipelineConfig {
            poll_timeout_secs: Some(1e30),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SensorlineError::Config(_))));
    }

    #[test]
    fn test_replay_allows_any_group_name() {
        let config = PipelineConfig {
            replay: Some(PathBuf::from("recording.jsonl")),
            sensors: vec!["custom".to_string()],
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_wrong_field_type_is_error() {
        assert!(PipelineConfig::from_toml("interval_secs = \"fast\"").is_err());
    }
}
