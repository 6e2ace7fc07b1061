//! Live source: sensors of a connected device

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Result, SensorlineError};
use crate::types::{MonotonicStamp, Reading, SensorKind};

use super::driver::{DeviceDriver, SensorReader};
use super::SensorChannel;

/// A connected device
pub struct LiveSource {
    driver: Box<dyn DeviceDriver>,
    device: String,
    interval: Duration,
}

impl std::fmt::Debug for LiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSource")
            .field("device", &self.device)
            .field("interval", &self.interval)
            .field("connected", &self.driver.is_connected())
            .finish()
    }
}

impl LiveSource {
    /// Connect to `device` through `driver`
    ///
    /// There is no retry: any connection failure is reported as
    /// `SourceUnavailable`.
    pub fn connect(
        mut driver: Box<dyn DeviceDriver>,
        device: &str,
        interval: Duration,
    ) -> Result<Self> {
        driver.connect(device).map_err(|e| match e {
            e @ SensorlineError::SourceUnavailable { .. } => e,
            other => SensorlineError::SourceUnavailable {
                device: device.to_string(),
                message: other.to_string(),
            },
        })?;
        tracing::info!("Connected to sensor device {}", device);
        Ok(Self {
            driver,
            device: device.to_string(),
            interval,
        })
    }

    /// Identifier of the connected device
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Sampling interval the sensors are configured with
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Open a channel for the named sensor
    pub fn channel(&self, sensor: &str) -> Result<Box<dyn SensorChannel>> {
        let kind: SensorKind = sensor.parse()?;
        let reader = self.driver.open_sensor(kind, self.interval)?;
        Ok(Box::new(LiveChannel::new(kind, reader)))
    }

    /// Disconnect the device
    pub fn close(&mut self) {
        if self.driver.is_connected() {
            self.driver.disconnect();
            tracing::info!("Disconnected from sensor device {}", self.device);
        }
    }
}

/// Channel over one sensor reader
pub struct LiveChannel {
    kind: SensorKind,
    reader: Box<dyn SensorReader>,
    sequence: u64,
    clock: MonotonicStamp,
}

impl LiveChannel {
    pub fn new(kind: SensorKind, reader: Box<dyn SensorReader>) -> Self {
        Self {
            kind,
            reader,
            sequence: 0,
            clock: MonotonicStamp::new(),
        }
    }
}

#[async_trait]
impl SensorChannel for LiveChannel {
    fn sensor(&self) -> &str {
        self.kind.name()
    }

    fn shape(&self) -> &[usize] {
        self.kind.shape()
    }

    async fn poll(&mut self) -> Result<Reading> {
        let value = self.reader.read().await?;
        self.sequence += 1;
        let time = self.clock.now();
        Ok(Reading::new(self.kind.name(), self.sequence, time, value))
    }
}
