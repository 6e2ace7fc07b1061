//! Mock Device Driver for Testing
//!
//! This module provides a mock device driver that can be used for running
//! the pipeline without real hardware. It synthesizes sensor values from
//! configurable patterns.
//!
//! # Data Patterns
//!
//! - [`MockDataPattern::Constant`] - Fixed value
//! - [`MockDataPattern::Sine`] - Sinusoidal wave with configurable frequency/amplitude
//! - [`MockDataPattern::Counter`] - Incrementing counter with wrap-around
//! - [`MockDataPattern::Random`] - Random values within a range
//! - [`MockDataPattern::Sawtooth`] - Linear ramp that resets periodically
//! - [`MockDataPattern::Square`] - Square wave alternating between two values
//! - [`MockDataPattern::Triangle`] - Triangle wave
//!
//! Every sensor starts with a plausible default (a slow sine around room
//! temperature, sea-level pressure and so on). Vector sensors generate each
//! axis from the same pattern, phase-shifted by [`AXIS_PHASE_SECS`].
//!
//! # Example
//!
//! ```ignore
//! use sensorline::source::mock_driver::{MockDriver, MockDataPattern, MockSensorConfig};
//!
//! let driver = MockDriver::new()
//!     .with_sensor(SensorKind::Light, MockSensorConfig::new(MockDataPattern::Constant(300.0)))
//!     .with_read_delay(Duration::from_millis(5));
//! let source = LiveSource::connect(Box::new(driver), "mock", Duration::from_secs(1))?;
//! ```
//!
//! # Enabling
//!
//! The mock driver is only available when the `mock-device` feature is
//! enabled (it is part of the default features).

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::error::{Result, SensorlineError};
use crate::types::{SensorKind, Value};

use super::driver::{DeviceDriver, SensorReader};

/// Device identifier that selects the mock driver on the command line
pub const MOCK_DEVICE_ID: &str = "mock";

/// Time offset between the axes of a vector sensor
pub const AXIS_PHASE_SECS: f64 = 1.25;

/// Pattern for generating mock data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockDataPattern {
    /// Constant value
    Constant(f64),
    /// Sine wave with frequency and amplitude
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Counter that increments
    Counter { step: f64, min: f64, max: f64 },
    /// Random values within range
    Random { min: f64, max: f64 },
    /// Sawtooth wave
    Sawtooth { period: f64, amplitude: f64 },
    /// Square wave
    Square { period: f64, amplitude: f64 },
    /// Triangle wave
    Triangle { period: f64, amplitude: f64 },
}

impl Default for MockDataPattern {
    fn default() -> Self {
        MockDataPattern::Sine {
            frequency: 0.1,
            amplitude: 1.0,
            offset: 0.0,
        }
    }
}

/// Configuration for one mock sensor
#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    /// Data generation pattern
    pub pattern: MockDataPattern,
    /// Constant added to every generated value
    pub offset: f64,
    /// Noise amplitude to add (0.0 = no noise)
    pub noise_amplitude: f64,
    /// If true, every read fails
    pub fail_reads: bool,
    /// Current counter value (for Counter pattern)
    counter_value: f64,
}

impl MockSensorConfig {
    /// Create a new mock sensor config
    pub fn new(pattern: MockDataPattern) -> Self {
        Self {
            pattern,
            offset: 0.0,
            noise_amplitude: 0.0,
            fail_reads: false,
            counter_value: 0.0,
        }
    }

    /// Shift all generated values
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Add noise to the generated values
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude;
        self
    }

    /// Make every read of this sensor fail
    pub fn failing(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Plausible defaults per sensor kind
    pub fn default_for(kind: SensorKind) -> Self {
        match kind {
            SensorKind::Temperature => Self::new(MockDataPattern::Sine {
                frequency: 1.0 / 600.0,
                amplitude: 1.5,
                offset: 21.0,
            })
            .with_noise(0.05),
            SensorKind::Pressure => Self::new(MockDataPattern::Sine {
                frequency: 1.0 / 3600.0,
                amplitude: 2.0,
                offset: 1013.25,
            })
            .with_noise(0.1),
            SensorKind::Humidity => Self::new(MockDataPattern::Triangle {
                period: 900.0,
                amplitude: 5.0,
            })
            .with_offset(45.0)
            .with_noise(0.2),
            SensorKind::Light => Self::new(MockDataPattern::Square {
                period: 120.0,
                amplitude: 150.0,
            })
            .with_offset(300.0)
            .with_noise(2.0),
            SensorKind::Accelerometer => Self::new(MockDataPattern::Sine {
                frequency: 0.2,
                amplitude: 0.6,
                offset: 0.0,
            })
            .with_noise(0.01),
        }
    }

    /// Generate a value based on the pattern and elapsed time
    pub fn generate_value(&mut self, elapsed_secs: f64) -> f64 {
        self.advance();
        self.value_at(elapsed_secs)
    }

    /// Step stateful patterns once; call once per read
    pub fn advance(&mut self) {
        if let MockDataPattern::Counter { step, min, max } = self.pattern {
            self.counter_value += step;
            if self.counter_value > max {
                self.counter_value = min;
            } else if self.counter_value < min {
                self.counter_value = max;
            }
        }
    }

    /// Value of the pattern at `elapsed_secs` without stepping it
    pub fn value_at(&self, elapsed_secs: f64) -> f64 {
        let base_value = match self.pattern {
            MockDataPattern::Constant(v) => v,
            MockDataPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * elapsed_secs).sin(),
            MockDataPattern::Counter { .. } => self.counter_value,
            MockDataPattern::Random { min, max } => min + rand_simple() * (max - min),
            MockDataPattern::Sawtooth { period, amplitude } => {
                let t = elapsed_secs % period;
                amplitude * (t / period)
            }
            MockDataPattern::Square { period, amplitude } => {
                let t = elapsed_secs % period;
                if t < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            MockDataPattern::Triangle { period, amplitude } => {
                let t = elapsed_secs % period;
                let half = period / 2.0;
                if t < half {
                    amplitude * (2.0 * t / half - 1.0)
                } else {
                    amplitude * (1.0 - 2.0 * (t - half) / half)
                }
            }
        };

        let value = base_value + self.offset;
        if self.noise_amplitude > 0.0 {
            value + (rand_simple() - 0.5) * 2.0 * self.noise_amplitude
        } else {
            value
        }
    }
}

/// Simple pseudo-random number generator (no external dependency)
fn rand_simple() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static SEED: Cell<u64> = const { Cell::new(0x5eed_1234_abcd) };
    }
    SEED.with(|seed| {
        let mut s = seed.get();
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        seed.set(s);
        (s as f64) / (u64::MAX as f64)
    })
}

/// Mock driver for running without a real device
#[derive(Debug)]
pub struct MockDriver {
    connected: bool,
    /// Device identifier passed to the last successful connect
    device: Option<String>,
    /// If set, connect fails with this message
    refuse_connect: Option<String>,
    configs: HashMap<SensorKind, MockSensorConfig>,
    /// Sensors the device does not have
    missing: HashSet<SensorKind>,
    /// Simulated read latency
    read_delay: Duration,
    connects: u32,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create a new mock driver with default patterns for every sensor
    pub fn new() -> Self {
        let configs = SensorKind::all()
            .iter()
            .map(|kind| (*kind, MockSensorConfig::default_for(*kind)))
            .collect();
        Self {
            connected: false,
            device: None,
            refuse_connect: None,
            configs,
            missing: HashSet::new(),
            read_delay: Duration::ZERO,
            connects: 0,
        }
    }

    /// Override the behavior of one sensor
    pub fn with_sensor(mut self, kind: SensorKind, config: MockSensorConfig) -> Self {
        self.configs.insert(kind, config);
        self
    }

    /// Set the simulated read delay
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Make every connection attempt fail
    pub fn refusing(mut self, message: impl Into<String>) -> Self {
        self.refuse_connect = Some(message.into());
        self
    }

    /// Simulate a device without the given sensor
    pub fn without_sensor(mut self, kind: SensorKind) -> Self {
        self.missing.insert(kind);
        self
    }

    /// Number of successful connects so far
    pub fn connect_count(&self) -> u32 {
        self.connects
    }
}

impl DeviceDriver for MockDriver {
    fn connect(&mut self, device: &str) -> Result<()> {
        if let Some(message) = &self.refuse_connect {
            return Err(SensorlineError::SourceUnavailable {
                device: device.to_string(),
                message: message.clone(),
            });
        }
        self.connected = true;
        self.device = Some(device.to_string());
        self.connects += 1;
        tracing::info!("Mock device connected: {}", device);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            tracing::info!("Mock device disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn open_sensor(&self, kind: SensorKind, interval: Duration) -> Result<Box<dyn SensorReader>> {
        if !self.connected {
            return Err(SensorlineError::SourceUnavailable {
                device: self.device.clone().unwrap_or_else(|| MOCK_DEVICE_ID.to_string()),
                message: "mock device not connected".to_string(),
            });
        }
        if self.missing.contains(&kind) {
            return Err(SensorlineError::UnknownSensor(kind.name().to_string()));
        }
        let config = self
            .configs
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| MockSensorConfig::new(MockDataPattern::default()));
        tracing::debug!("Mock sensor {} opened at {:?}", kind, interval);
        Ok(Box::new(MockSensorReader {
            kind,
            config,
            started: Instant::now(),
            read_delay: self.read_delay,
        }))
    }
}

/// Reader for one mock sensor
#[derive(Debug)]
pub struct MockSensorReader {
    kind: SensorKind,
    config: MockSensorConfig,
    started: Instant,
    read_delay: Duration,
}

#[async_trait]
impl SensorReader for MockSensorReader {
    async fn read(&mut self) -> Result<Value> {
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        if self.config.fail_reads {
            return Err(SensorlineError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("mock {} read failed", self.kind),
            )));
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        self.config.advance();
        let value = match self.kind.shape() {
            [axes] => Value::Vector(
                (0..*axes)
                    .map(|i| self.config.value_at(elapsed + i as f64 * AXIS_PHASE_SECS))
                    .collect(),
            ),
            _ => Value::Scalar(self.config.value_at(elapsed)),
        };
        Ok(value)
    }
}
