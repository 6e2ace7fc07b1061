//! Test data builders for recordings and configs

use sensorline::config::{DashboardSettings, PipelineConfig};
use sensorline::{Reading, Recording, Value};
use std::path::{Path, PathBuf};

/// Builder for in-memory recordings
pub struct RecordingBuilder {
    recording: Recording,
}

impl RecordingBuilder {
    pub fn new(interval_secs: f64) -> Self {
        Self {
            recording: Recording::new(interval_secs),
        }
    }

    /// Add a scalar sensor with the given values, one per interval
    pub fn scalar(self, sensor: &str, values: &[f64]) -> Self {
        self.sensor(sensor, vec![], values.iter().map(|v| Value::Scalar(*v)))
    }

    /// Add a three-axis sensor
    pub fn vector(self, sensor: &str, values: &[[f64; 3]]) -> Self {
        self.sensor(sensor, vec![3], values.iter().map(|v| Value::Vector(v.to_vec())))
    }

    fn sensor(mut self, sensor: &str, shape: Vec<usize>, values: impl Iterator<Item = Value>) -> Self {
        let interval = self.recording.interval_secs;
        self.recording.declare_channel(sensor, shape);
        for (i, value) in values.enumerate() {
            self.recording.push_reading(Reading::new(
                sensor,
                i as u64 + 1,
                1_000.0 + i as f64 * interval,
                value,
            ));
        }
        self
    }

    pub fn build(self) -> Recording {
        self.recording
    }

    /// Write the recording into `dir` and return its path
    pub fn save(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        self.recording.save(&path).expect("save recording");
        path
    }
}

/// Config replaying `recording` with every optional sink off
pub fn replay_config(recording: &Path, sensors: &[&str]) -> PipelineConfig {
    PipelineConfig {
        sensors: sensors.iter().map(|s| s.to_string()).collect(),
        replay: Some(recording.to_path_buf()),
        interval_secs: 0.1,
        ..Default::default()
    }
}

/// Enable the cache and dashboard on a config
pub fn with_dashboard(mut config: PipelineConfig) -> PipelineConfig {
    config.dashboard = Some(DashboardSettings::default());
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_builder() {
        let recording = RecordingBuilder::new(0.5)
            .scalar("light", &[1.0, 2.0])
            .vector("accelerometer", &[[0.0, 0.0, 1.0]])
            .build();

        assert_eq!(recording.readings("light").len(), 2);
        assert_eq!(recording.readings("light")[1].time, 1_000.5);
        assert_eq!(recording.shape("accelerometer"), Some(vec![3]));
    }
}
