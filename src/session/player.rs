//! Replay cursor over one sensor group of a recording

use std::sync::Arc;

use crate::error::{Result, SensorlineError};
use crate::types::Value;

use super::types::Recording;

/// Cycles endlessly through the recorded values of one sensor
///
/// The position is an explicit index into the group; after the last value it
/// wraps to the first. The recording is shared, so many cursors (one per
/// channel) can replay the same file.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    recording: Arc<Recording>,
    sensor: String,
    /// Index of the next value to return
    position: usize,
    /// Number of completed passes over the group
    loops: u64,
}

impl ReplayCursor {
    /// Create a cursor for `sensor`
    ///
    /// Fails with `UnknownSensorGroup` when the recording has no readings
    /// for that sensor.
    pub fn new(recording: Arc<Recording>, sensor: &str) -> Result<Self> {
        if !recording.has_group(sensor) {
            return Err(SensorlineError::UnknownSensorGroup(sensor.to_string()));
        }
        Ok(Self {
            recording,
            sensor: sensor.to_string(),
            position: 0,
            loops: 0,
        })
    }

    /// Sensor this cursor replays
    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    /// Next recorded value, wrapping after the last one
    pub fn next_value(&mut self) -> Value {
        let group = self.recording.readings(&self.sensor);
        // Non-empty by construction
        let value = group[self.position].value.clone();
        self.position = (self.position + 1) % group.len();
        if self.position == 0 {
            self.loops += 1;
        }
        value
    }

    /// Start over from the first recorded value
    pub fn reset(&mut self) {
        self.position = 0;
        self.loops = 0;
    }

    /// Index of the next value
    pub fn position(&self) -> usize {
        self.position
    }

    /// Completed passes over the group
    pub fn loops(&self) -> u64 {
        self.loops
    }

    /// Number of values in one pass
    pub fn group_len(&self) -> usize {
        self.recording.readings(&self.sensor).len()
    }
}
