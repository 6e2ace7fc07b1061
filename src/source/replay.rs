//! Replay source: recorded sensor groups played back in a loop

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::session::{Recording, ReplayCursor};
use crate::types::{MonotonicStamp, Reading};

use super::SensorChannel;

/// Source backed by a loaded recording
///
/// Each channel cycles through the recorded values of its sensor forever.
/// Readings get fresh wall-clock timestamps and a per-channel poll counter as
/// sequence, so replayed data looks like a live run to every sink.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    recording: Arc<Recording>,
}

impl ReplaySource {
    pub fn new(recording: Arc<Recording>) -> Self {
        Self { recording }
    }

    /// Load a recording file and replay it
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Replaying data file {:?}", path);
        Ok(Self::new(Arc::new(Recording::load(path)?)))
    }

    /// The recording being replayed
    pub fn recording(&self) -> &Arc<Recording> {
        &self.recording
    }

    /// Open a channel for the named sensor group
    ///
    /// Fails with `UnknownSensorGroup` when the recording has no readings
    /// for `sensor`.
    pub fn channel(&self, sensor: &str) -> Result<Box<dyn SensorChannel>> {
        let cursor = ReplayCursor::new(Arc::clone(&self.recording), sensor)?;
        let shape = self.recording.shape(sensor).unwrap_or_default();
        Ok(Box::new(ReplayChannel {
            cursor,
            shape,
            sequence: 0,
            clock: MonotonicStamp::new(),
        }))
    }
}

/// Channel replaying one sensor group
#[derive(Debug)]
pub struct ReplayChannel {
    cursor: ReplayCursor,
    shape: Vec<usize>,
    sequence: u64,
    clock: MonotonicStamp,
}

impl ReplayChannel {
    /// Restart from the first recorded value
    pub fn reset(&mut self) {
        self.cursor.reset();
    }
}

#[async_trait]
impl SensorChannel for ReplayChannel {
    fn sensor(&self) -> &str {
        self.cursor.sensor()
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    async fn poll(&mut self) -> Result<Reading> {
        let value = self.cursor.next_value();
        self.sequence += 1;
        let time = self.clock.now();
        Ok(Reading::new(self.cursor.sensor(), self.sequence, time, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorlineError;

    fn source() -> ReplaySource {
        let mut recording = Recording::new(1.0);
        recording.declare_channel("accelerometer", vec![3]);
        for (i, v) in [10.0, 20.0].iter().enumerate() {
            recording.push_reading(Reading::new("temperature", i as u64, 100.0 + i as f64, *v));
        }
        recording.push_reading(Reading::new("accelerometer", 0, 100.0, vec![0.0, 0.0, 1.0]));
        ReplaySource::new(Arc::new(recording))
    }

    #[tokio::test]
    async fn test_replay_cycles() {
        let source = source();
        let mut channel = source.channel("temperature").unwrap();
        let mut values = Vec::new();
        let mut last_time = 0.0;
        for expected_seq in 1..=5 {
            let reading = channel.poll().await.unwrap();
            assert_eq!(reading.sequence, expected_seq);
            assert!(reading.time >= last_time);
            last_time = reading.time;
            values.push(reading.value.as_scalar());
        }
        assert_eq!(values, vec![10.0, 20.0, 10.0, 20.0, 10.0]);
    }

    #[test]
    fn test_missing_group() {
        let err = source().channel("humidity").err().unwrap();
        assert!(matches!(err, SensorlineError::UnknownSensorGroup(ref s) if s == "humidity"));
    }

    #[test]
    fn test_declared_shape() {
        let source = source();
        assert_eq!(source.channel("accelerometer").unwrap().shape(), &[3]);
        assert!(source.channel("temperature").unwrap().shape().is_empty());
    }
}
