//! DeviceDriver trait for the live sensor device
//!
//! This module provides the seam between the live source and the actual
//! device access layer, so that real hardware drivers and the mock driver
//! can be used interchangeably.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{SensorKind, Value};

/// Reader for one sensor of a connected device
#[async_trait]
pub trait SensorReader: Send {
    /// Read the current value of the sensor
    async fn read(&mut self) -> Result<Value>;
}

/// Access to a multi-sensor device
///
/// Implementations own the connection. Readers handed out by
/// [`DeviceDriver::open_sensor`] stay valid until the driver is disconnected.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceDriver: Send + Sync {
    /// Connect to the device with the given identifier
    fn connect(&mut self, device: &str) -> Result<()>;

    /// Disconnect from the device (idempotent)
    fn disconnect(&mut self);

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Open a reader for `kind`, sampling at `interval`
    fn open_sensor(&self, kind: SensorKind, interval: Duration) -> Result<Box<dyn SensorReader>>;
}
