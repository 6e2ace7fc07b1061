//! Data log: durable record of every reading of a run
//!
//! [`DataLog`] is the seam the pipeline writes through. [`JsonLinesLog`] is
//! the shipped implementation, writing the recording format described in
//! [`super::types`]. [`LogFiles`] hands out a fresh file name per rotation
//! cycle.

use chrono::{Local, Utc};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt, SensorlineError};
use crate::types::Reading;

use super::types::{EventEntry, LogEntry};

/// Default number of readings between flushes
pub const DEFAULT_FLUSH_EVERY: usize = 60;

/// A sink that durably records readings
///
/// Declaring zero channels is valid (the log simply records nothing but its
/// header). Every operation after [`DataLog::close`] fails with `SinkClosed`,
/// except `close` itself which is idempotent.
pub trait DataLog: Send {
    /// Declare a channel and its value shape
    fn add_channel(&mut self, name: &str, shape: &[usize]) -> Result<()>;

    /// Record one reading
    fn append(&mut self, reading: &Reading) -> Result<()>;

    /// Record a scheduler debug event
    fn notify(&mut self, event: &EventEntry) -> Result<()>;

    /// Flush and release the underlying storage
    fn close(&mut self) -> Result<()>;

    /// Whether the log has been closed
    fn is_closed(&self) -> bool;
}

/// Buffered JSON Lines file log
#[derive(Debug)]
pub struct JsonLinesLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    flush_every: usize,
    /// Readings appended since the last flush
    pending: usize,
    readings_written: u64,
    channels: HashSet<String>,
}

impl JsonLinesLog {
    /// Create the file and write its header
    pub fn create(path: impl AsRef<Path>, interval_secs: f64, flush_every: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).with_context(|| format!("creating log {:?}", path))?;
        let mut writer = BufWriter::new(file);
        let header = LogEntry::Header {
            created_at: Utc::now(),
            interval_secs,
        };
        writeln!(writer, "{}", header.to_line()?)?;
        tracing::info!("Data log opened: {:?}", path);

        Ok(Self {
            path,
            writer: Some(writer),
            flush_every: flush_every.max(1),
            pending: 0,
            readings_written: 0,
            channels: HashSet::new(),
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of readings appended so far
    pub fn readings_written(&self) -> u64 {
        self.readings_written
    }

    fn write_entry(&mut self, entry: &LogEntry) -> Result<()> {
        let line = entry.to_line()?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SensorlineError::SinkClosed(self.path.display().to_string()))?;
        writeln!(writer, "{}", line).map_err(|e| SensorlineError::sink("data log", e))
    }
}

impl DataLog for JsonLinesLog {
    fn add_channel(&mut self, name: &str, shape: &[usize]) -> Result<()> {
        self.write_entry(&LogEntry::Channel {
            name: name.to_string(),
            shape: shape.to_vec(),
        })?;
        self.channels.insert(name.to_string());
        tracing::debug!("Log channel declared: {} {:?}", name, shape);
        Ok(())
    }

    fn append(&mut self, reading: &Reading) -> Result<()> {
        self.write_entry(&LogEntry::Reading(reading.clone()))?;
        self.readings_written += 1;
        self.pending += 1;
        if self.pending >= self.flush_every {
            if let Some(writer) = self.writer.as_mut() {
                writer
                    .flush()
                    .map_err(|e| SensorlineError::sink("data log", e))?;
            }
            self.pending = 0;
        }
        Ok(())
    }

    fn notify(&mut self, event: &EventEntry) -> Result<()> {
        self.write_entry(&LogEntry::Event(event.clone()))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::info!(
                "Data log closed: {:?} ({} readings, {} channels)",
                self.path,
                self.readings_written,
                self.channels.len()
            );
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl Drop for JsonLinesLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close data log {:?}: {}", self.path, e);
        }
    }
}

/// Generates one log file name per rotation cycle
///
/// Names are `<prefix>-YYYYMMDD-HHMMSS.jsonl` in local time. When two cycles
/// start within the same second, or a file of that name already exists, a
/// numeric suffix is added (`-1`, `-2`, ...).
#[derive(Debug, Clone)]
pub struct LogFiles {
    dir: PathBuf,
    prefix: String,
    issued: HashSet<PathBuf>,
}

impl LogFiles {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            issued: HashSet::new(),
        }
    }

    /// Directory the files are created in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Next unused file name, creating the directory if needed
    pub fn next_path(&mut self) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating data directory {:?}", self.dir))?;

        let stem = format!("{}-{}", self.prefix, Local::now().format("%Y%m%d-%H%M%S"));
        let mut candidate = self.dir.join(format!("{}.jsonl", stem));
        let mut suffix = 0u32;
        while candidate.exists() || self.issued.contains(&candidate) {
            suffix += 1;
            candidate = self.dir.join(format!("{}-{}.jsonl", stem, suffix));
        }
        self.issued.insert(candidate.clone());
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Recording;

    #[test]
    fn test_log_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");

        let mut log = JsonLinesLog::create(&path, 1.0, 2).unwrap();
        log.add_channel("temperature", &[]).unwrap();
        log.add_channel("accelerometer", &[3]).unwrap();
        log.append(&Reading::new("temperature", 1, 10.0, 21.0)).unwrap();
        log.append(&Reading::new("accelerometer", 1, 10.0, vec![0.0, 0.0, 1.0]))
            .unwrap();
        log.append(&Reading::new("temperature", 2, 11.0, 21.5)).unwrap();
        log.notify(&EventEntry {
            time: 12.0,
            sensor: "temperature".into(),
            event: "missed".into(),
            detail: None,
        })
        .unwrap();
        log.close().unwrap();
        assert_eq!(log.readings_written(), 3);

        let recording = Recording::load(&path).unwrap();
        assert_eq!(recording.readings("temperature").len(), 2);
        assert_eq!(recording.shape("accelerometer"), Some(vec![3]));
        assert_eq!(recording.events().len(), 1);
    }

    #[test]
    fn test_non_finite_readings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaps.jsonl");

        let mut log = JsonLinesLog::create(&path, 1.0, 10).unwrap();
        log.add_channel("light", &[]).unwrap();
        log.add_channel("accelerometer", &[3]).unwrap();
        log.append(&Reading::new("light", 1, 1.0, 120.0)).unwrap();
        log.append(&Reading::new("light", 2, 2.0, f64::NAN)).unwrap();
        log.append(&Reading::new("light", 3, 3.0, f64::INFINITY)).unwrap();
        log.append(&Reading::new("accelerometer", 1, 1.0, vec![0.0, f64::NAN, 1.0]))
            .unwrap();
        log.close().unwrap();

        let recording = Recording::load(&path).unwrap();
        let light: Vec<f64> = recording
            .readings("light")
            .iter()
            .map(|r| r.value.as_scalar())
            .collect();
        assert_eq!(light.len(), 3);
        assert_eq!(light[0], 120.0);
        assert!(light[1].is_nan());
        assert!(light[2].is_nan());

        let accel = &recording.readings("accelerometer")[0];
        assert_eq!(accel.value.shape(), vec![3]);
        assert_eq!(accel.sequence, 1);
    }

    #[test]
    fn test_appends_reach_file_every_flush_every() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffered.jsonl");
        let on_disk = || std::fs::metadata(&path).unwrap().len();

        let mut log = JsonLinesLog::create(&path, 1.0, 3).unwrap();
        log.add_channel("humidity", &[]).unwrap();
        log.append(&Reading::new("humidity", 1, 1.0, 40.0)).unwrap();
        log.append(&Reading::new("humidity", 2, 2.0, 41.0)).unwrap();
        assert_eq!(on_disk(), 0);

        log.append(&Reading::new("humidity", 3, 3.0, 42.0)).unwrap();
        let flushed = on_disk();
        assert!(flushed > 0);

        log.append(&Reading::new("humidity", 4, 4.0, 43.0)).unwrap();
        assert_eq!(on_disk(), flushed);
        log.close().unwrap();
        assert!(on_disk() > flushed);
    }

    #[test]
    fn test_append_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = JsonLinesLog::create(dir.path().join("closed.jsonl"), 1.0, 10).unwrap();
        log.close().unwrap();
        assert!(log.is_closed());
        let err = log.append(&Reading::new("light", 1, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, SensorlineError::SinkClosed(_)));
        // close is idempotent
        log.close().unwrap();
    }

    #[test]
    fn test_zero_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        let mut log = JsonLinesLog::create(&path, 2.0, 10).unwrap();
        log.close().unwrap();
        let recording = Recording::load(&path).unwrap();
        assert!(recording.is_empty());
        assert_eq!(recording.interval_secs, 2.0);
    }

    #[test]
    fn test_log_files_unique() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = LogFiles::new(dir.path().join("data"), "sensorline");
        let a = files.next_path().unwrap();
        let b = files.next_path().unwrap();
        assert_ne!(a, b);
        assert!(dir.path().join("data").is_dir());

        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("sensorline-"));
        assert!(name.ends_with(".jsonl"));
        // sensorline-YYYYMMDD-HHMMSS.jsonl
        assert_eq!(name.len(), "sensorline-".len() + 15 + ".jsonl".len());
    }
}
