//! Sensor sources
//!
//! A [`Source`] hands out one [`SensorChannel`] per requested sensor. The
//! pipeline only ever talks to channels, so live and replayed data are
//! indistinguishable downstream.
//!
//! # Sources
//!
//! - [`Source::Live`] - a device reached through an injected [`DeviceDriver`]
//! - [`Source::Replay`] - a recording cycled endlessly

pub mod driver;
pub mod live;
#[cfg(feature = "mock-device")]
pub mod mock_driver;
pub mod replay;

pub use driver::{DeviceDriver, SensorReader};
pub use live::{LiveChannel, LiveSource};
#[cfg(feature = "mock-device")]
pub use mock_driver::{MockDataPattern, MockDriver, MockSensorConfig, MOCK_DEVICE_ID};
pub use replay::{ReplayChannel, ReplaySource};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Reading;

/// One pollable sensor
#[async_trait]
pub trait SensorChannel: Send {
    /// Sensor (channel) name
    fn sensor(&self) -> &str;

    /// Value shape: empty for scalars
    fn shape(&self) -> &[usize];

    /// Produce the next reading
    async fn poll(&mut self) -> Result<Reading>;
}

/// Where readings come from
#[derive(Debug)]
pub enum Source {
    Live(LiveSource),
    Replay(ReplaySource),
}

impl Source {
    /// Open a channel for the named sensor
    pub fn channel(&self, sensor: &str) -> Result<Box<dyn SensorChannel>> {
        match self {
            Source::Live(live) => live.channel(sensor),
            Source::Replay(replay) => replay.channel(sensor),
        }
    }

    /// Release the source (disconnects a live device)
    pub fn close(&mut self) {
        match self {
            Source::Live(live) => live.close(),
            Source::Replay(_) => {}
        }
    }

    /// Short description for log messages
    pub fn describe(&self) -> String {
        match self {
            Source::Live(live) => format!("device {}", live.device()),
            Source::Replay(_) => "replay".to_string(),
        }
    }
}

impl From<LiveSource> for Source {
    fn from(source: LiveSource) -> Self {
        Source::Live(source)
    }
}

impl From<ReplaySource> for Source {
    fn from(source: ReplaySource) -> Self {
        Source::Replay(source)
    }
}
