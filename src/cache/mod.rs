//! Bounded in-memory sensor data cache
//!
//! The cache keeps a recent window of telemetry per sensor for dashboard
//! queries. Each sensor owns a ring buffer of `(time, value)` pairs in arrival
//! order; once a buffer holds `capacity` samples, every insert evicts the
//! oldest sample. Eviction is silent: the cache is a window, the data log is
//! the durable record.
//!
//! # Concurrency
//!
//! Ingestion (the cache feeder task) and queries (dashboard requests) run
//! concurrently. All buffers sit behind one `RwLock`; a batch is applied under
//! a single write lock and snapshots copy under a read lock, so a query never
//! observes a half-applied eviction. The lock is never held across an await.

pub mod ingest;

pub use ingest::{Ingest, Record};

use crate::error::{Result, SensorlineError};
use crate::session::Recording;
use crate::types::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

/// Default samples kept per sensor: one day at 1 Hz
pub const DEFAULT_CACHE_CAPACITY: usize = 86_400;

/// A cached `(time, value)` pair
pub type Sample = (f64, Value);

/// Per-sensor bounded ring buffers
#[derive(Debug)]
pub struct SensorCache {
    capacity: usize,
    /// Sensor names in registration order
    sensors: Vec<String>,
    series: RwLock<HashMap<String, VecDeque<Sample>>>,
}

impl SensorCache {
    /// Create a cache with one empty buffer per sensor
    pub fn new<I, S>(sensors: I, capacity: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if capacity == 0 {
            return Err(SensorlineError::Config(
                "cache capacity must be at least 1".to_string(),
            ));
        }

        let mut names = Vec::new();
        let mut series = HashMap::new();
        for name in sensors {
            let name = name.into();
            if series.contains_key(&name) {
                continue;
            }
            // Grow lazily up to capacity
            series.insert(name.clone(), VecDeque::with_capacity(capacity.min(1024)));
            names.push(name);
        }

        Ok(Self {
            capacity,
            sensors: names,
            series: RwLock::new(series),
        })
    }

    /// Create a cache with the default capacity
    pub fn with_default_capacity<I, S>(sensors: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(sensors, DEFAULT_CACHE_CAPACITY)
    }

    /// Maximum samples kept per sensor
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registered sensor names in registration order
    pub fn sensors(&self) -> &[String] {
        &self.sensors
    }

    /// Ingest a reading, a record or a batch
    ///
    /// Batches are applied in order under one write lock. If an element fails,
    /// the elements before it stay ingested.
    pub fn ingest(&self, item: impl Into<Ingest>) -> Result<()> {
        let item = item.into();
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        Self::apply(&mut series, self.capacity, item)
    }

    fn apply(
        series: &mut HashMap<String, VecDeque<Sample>>,
        capacity: usize,
        item: Ingest,
    ) -> Result<()> {
        match item {
            Ingest::Reading(r) => Self::push(series, capacity, &r.sensor, r.time, r.value),
            Ingest::Record(record) => {
                let (name, time, value) = record.normalize()?;
                Self::push(series, capacity, name, time, value)
            }
            Ingest::Batch(items) => {
                for item in items {
                    Self::apply(series, capacity, item)?;
                }
                Ok(())
            }
        }
    }

    fn push(
        series: &mut HashMap<String, VecDeque<Sample>>,
        capacity: usize,
        name: &str,
        time: f64,
        value: Value,
    ) -> Result<()> {
        let buffer = series
            .get_mut(name)
            .ok_or_else(|| SensorlineError::UnknownSensor(name.to_string()))?;
        if buffer.len() >= capacity {
            buffer.pop_front();
        }
        buffer.push_back((time, value));
        Ok(())
    }

    /// Copy of the current samples for a sensor, oldest first
    pub fn snapshot(&self, sensor: &str) -> Result<Vec<Sample>> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series
            .get(sensor)
            .map(|buffer| buffer.iter().cloned().collect())
            .ok_or_else(|| SensorlineError::UnknownSensor(sensor.to_string()))
    }

    /// Snapshot projected onto scalars (vectors become their magnitude)
    pub fn series(&self, sensor: &str) -> Result<Vec<(f64, f64)>> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series
            .get(sensor)
            .map(|buffer| buffer.iter().map(|(t, v)| (*t, v.as_scalar())).collect())
            .ok_or_else(|| SensorlineError::UnknownSensor(sensor.to_string()))
    }

    /// Most recent sample for a sensor
    pub fn latest(&self, sensor: &str) -> Result<Option<Sample>> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series
            .get(sensor)
            .map(|buffer| buffer.back().cloned())
            .ok_or_else(|| SensorlineError::UnknownSensor(sensor.to_string()))
    }

    /// Number of samples held for a sensor
    pub fn len(&self, sensor: &str) -> usize {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series.get(sensor).map_or(0, VecDeque::len)
    }

    /// Whether no sensor holds any sample
    pub fn is_empty(&self) -> bool {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series.values().all(VecDeque::is_empty)
    }

    /// Seed the cache with the tail of a recording
    ///
    /// Takes at most `per_sensor` of the latest recorded readings of every
    /// registered sensor. Sensors the recording does not contain are skipped.
    /// Returns the number of samples loaded.
    pub fn preload(&self, recording: &Recording, per_sensor: usize) -> Result<usize> {
        let mut loaded = 0;
        for sensor in &self.sensors {
            let readings = recording.readings(sensor);
            let skip = readings.len().saturating_sub(per_sensor);
            let tail: Vec<_> = readings[skip..].to_vec();
            loaded += tail.len();
            self.ingest(tail)?;
        }
        tracing::debug!("Preloaded {} cached samples", loaded);
        Ok(loaded)
    }
}
