//! Core data types for sensorline
//!
//! This module contains the fundamental data structures that flow through
//! the pipeline.
//!
//! # Main Types
//!
//! - [`SensorKind`] - The fixed set of sensors a live device exposes
//! - [`Value`] - A scalar or fixed-length vector sample
//! - [`Reading`] - One timestamped sample from one sensor
//!
//! # Value Shapes
//!
//! Every sensor has a fixed value arity for the lifetime of a run. Scalar
//! sensors have the empty shape `[]`, the accelerometer has shape `[3]`.
//! Shapes are declared on the data log when a channel is registered.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::SensorlineError;

/// Default sampling interval of a live device, in seconds
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// Sensors available on a live device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Ambient temperature
    Temperature,
    /// Barometric pressure
    Pressure,
    /// Relative humidity
    Humidity,
    /// Light intensity
    Light,
    /// Three-axis acceleration
    Accelerometer,
}

impl SensorKind {
    /// All sensor kinds in declaration order
    pub fn all() -> &'static [SensorKind] {
        &[
            SensorKind::Temperature,
            SensorKind::Pressure,
            SensorKind::Humidity,
            SensorKind::Light,
            SensorKind::Accelerometer,
        ]
    }

    /// Channel name used for this sensor throughout the pipeline
    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Pressure => "pressure",
            SensorKind::Humidity => "humidity",
            SensorKind::Light => "light",
            SensorKind::Accelerometer => "accelerometer",
        }
    }

    /// Value shape: empty for scalars, `[3]` for the accelerometer
    pub fn shape(&self) -> &'static [usize] {
        match self {
            SensorKind::Accelerometer => &[3],
            _ => &[],
        }
    }

    /// Unit string for display
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Pressure => "hPa",
            SensorKind::Humidity => "%RH",
            SensorKind::Light => "lux",
            SensorKind::Accelerometer => "g",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SensorKind {
    type Err = SensorlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKind::all()
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| SensorlineError::UnknownSensor(s.to_string()))
    }
}

/// A sampled value
///
/// Serialized untagged: a scalar is a JSON number, a vector a JSON array.
/// JSON has no NaN or infinity, so serde_json writes those as `null`; a
/// `null` is read back as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "WireValue")]
pub enum Value {
    /// Single numeric sample
    Scalar(f64),
    /// Fixed-length multi-axis sample
    Vector(Vec<f64>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Scalar(Option<f64>),
    Vector(Vec<Option<f64>>),
}

impl From<WireValue> for Value {
    fn from(wire: WireValue) -> Self {
        match wire {
            WireValue::Scalar(v) => Value::Scalar(v.unwrap_or(f64::NAN)),
            WireValue::Vector(v) => {
                Value::Vector(v.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
            }
        }
    }
}

impl Value {
    /// Shape of this value, matching the channel declaration
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Value::Scalar(_) => Vec::new(),
            Value::Vector(v) => vec![v.len()],
        }
    }

    /// Euclidean norm (absolute value for scalars)
    pub fn magnitude(&self) -> f64 {
        match self {
            Value::Scalar(v) => v.abs(),
            Value::Vector(v) => v.iter().map(|x| x * x).sum::<f64>().sqrt(),
        }
    }

    /// Scalar view used for plotting and downsampling
    pub fn as_scalar(&self) -> f64 {
        match self {
            Value::Scalar(v) => *v,
            Value::Vector(_) => self.magnitude(),
        }
    }

    /// Whether this is a multi-axis value
    pub fn is_vector(&self) -> bool {
        matches!(self, Value::Vector(_))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Vector(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{}", v),
            Value::Vector(v) => {
                let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// One timestamped sample from one sensor
///
/// Created by a source and never mutated afterwards; sinks receive clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Sensor (channel) name
    #[serde(rename = "name")]
    pub sensor: String,
    /// Monotonic counter from the source
    pub sequence: u64,
    /// Seconds since the Unix epoch
    pub time: f64,
    /// Sampled value
    pub value: Value,
}

impl Reading {
    /// Create a reading
    pub fn new(sensor: impl Into<String>, sequence: u64, time: f64, value: impl Into<Value>) -> Self {
        Self {
            sensor: sensor.into(),
            sequence,
            time,
            value: value.into(),
        }
    }

    /// Copy of this reading with vector values collapsed to their magnitude
    pub fn to_magnitude(&self) -> Reading {
        match self.value {
            Value::Scalar(_) => self.clone(),
            Value::Vector(_) => Reading {
                value: Value::Scalar(self.value.magnitude()),
                ..self.clone()
            },
        }
    }
}

/// Wall-clock time in seconds since the Unix epoch
pub fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Per-channel clock that never goes backwards
///
/// Wall-clock time can step back (NTP adjustments); readings within one run
/// must keep non-decreasing timestamps, so the last stamp is held on to.
#[derive(Debug, Clone, Default)]
pub struct MonotonicStamp {
    last: f64,
}

impl MonotonicStamp {
    /// Create a new stamp starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a time, clamping it to the previous one
    pub fn stamp(&mut self, time: f64) -> f64 {
        if time > self.last {
            self.last = time;
        }
        self.last
    }

    /// Stamp the current wall-clock time
    pub fn now(&mut self) -> f64 {
        self.stamp(now_secs())
    }
}
