//! Recording data types
//!
//! A recording is a JSON Lines file. Every line is one [`LogEntry`], tagged by
//! its `kind` field:
//!
//! ```text
//! {"kind":"header","created_at":"2026-01-01T00:00:00Z","interval_secs":1.0}
//! {"kind":"channel","name":"temperature","shape":[]}
//! {"kind":"reading","name":"temperature","sequence":1,"time":1767225600.0,"value":21.5}
//! {"kind":"event","time":1767225601.0,"sensor":"light","event":"missed"}
//! ```
//!
//! The same format is written by the data log and read back for replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SensorlineError};
use crate::types::Reading;

/// A scheduler debug event stored alongside readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    /// Wall-clock time of the event
    pub time: f64,
    /// Sensor the event concerns
    pub sensor: String,
    /// Event name (`missed`, `poll_error`)
    pub event: String,
    /// Optional free-form detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One line of a recording file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogEntry {
    /// File header, always the first line
    Header {
        created_at: DateTime<Utc>,
        interval_secs: f64,
    },
    /// A declared channel and its value shape
    Channel { name: String, shape: Vec<usize> },
    /// A sampled reading
    Reading(Reading),
    /// A scheduler event
    Event(EventEntry),
}

impl LogEntry {
    /// Serialize as a single line (without the trailing newline)
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A declared channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDecl {
    pub name: String,
    pub shape: Vec<usize>,
}

/// An in-memory recording: readings grouped per sensor, in file order
#[derive(Debug, Clone, Default)]
pub struct Recording {
    /// When the recording was created (from the header)
    pub created_at: Option<DateTime<Utc>>,
    /// Sampling interval the recording was made with
    pub interval_secs: f64,
    channels: Vec<ChannelDecl>,
    groups: HashMap<String, Vec<Reading>>,
    events: Vec<EventEntry>,
}

impl Recording {
    /// Create an empty recording
    pub fn new(interval_secs: f64) -> Self {
        Self {
            created_at: Some(Utc::now()),
            interval_secs,
            ..Default::default()
        }
    }

    /// Declare a channel; re-declaring a name replaces its shape
    pub fn declare_channel(&mut self, name: impl Into<String>, shape: Vec<usize>) {
        let name = name.into();
        match self.channels.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.shape = shape,
            None => self.channels.push(ChannelDecl { name, shape }),
        }
    }

    /// Append a reading to its sensor group
    pub fn push_reading(&mut self, reading: Reading) {
        self.groups
            .entry(reading.sensor.clone())
            .or_default()
            .push(reading);
    }

    /// Append a scheduler event
    pub fn push_event(&mut self, event: EventEntry) {
        self.events.push(event);
    }

    /// Readings of one sensor in recorded order (empty if absent)
    pub fn readings(&self, sensor: &str) -> &[Reading] {
        self.groups.get(sensor).map_or(&[], Vec::as_slice)
    }

    /// Whether the recording holds at least one reading for `sensor`
    pub fn has_group(&self, sensor: &str) -> bool {
        !self.readings(sensor).is_empty()
    }

    /// Shape of a sensor's values
    ///
    /// The declared shape wins; otherwise the first reading decides.
    pub fn shape(&self, sensor: &str) -> Option<Vec<usize>> {
        self.channels
            .iter()
            .find(|c| c.name == sensor)
            .map(|c| c.shape.clone())
            .or_else(|| self.readings(sensor).first().map(|r| r.value.shape()))
    }

    /// Declared channels in declaration order
    pub fn channels(&self) -> &[ChannelDecl] {
        &self.channels
    }

    /// Sensor names with readings, declared channels first, the rest sorted
    pub fn sensors(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .channels
            .iter()
            .map(|c| c.name.as_str())
            .filter(|n| self.has_group(n))
            .collect();
        let mut rest: Vec<&str> = self
            .groups
            .keys()
            .map(String::as_str)
            .filter(|n| !names.contains(n))
            .collect();
        rest.sort_unstable();
        names.extend(rest);
        names
    }

    /// Recorded scheduler events
    pub fn events(&self) -> &[EventEntry] {
        &self.events
    }

    /// Total number of readings
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Whether there are no readings at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Header {
                created_at,
                interval_secs,
            } => {
                self.created_at = Some(created_at);
                self.interval_secs = interval_secs;
            }
            LogEntry::Channel { name, shape } => self.declare_channel(name, shape),
            LogEntry::Reading(reading) => self.push_reading(reading),
            LogEntry::Event(event) => self.push_event(event),
        }
    }

    /// Parse a recording from any buffered reader
    ///
    /// Blank lines are ignored. A malformed line fails with a serialization
    /// error naming its 1-based line number.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut recording = Recording::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: LogEntry = serde_json::from_str(&line).map_err(|e| {
                SensorlineError::Serialization(format!("line {}: {}", index + 1, e))
            })?;
            recording.apply(entry);
        }
        Ok(recording)
    }

    /// Load a recording from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let recording = Self::from_reader(BufReader::new(file))?;
        tracing::info!(
            "Loaded recording {:?}: {} readings in {} groups",
            path,
            recording.len(),
            recording.groups.len()
        );
        Ok(recording)
    }

    /// Write the recording to disk in log format
    ///
    /// Readings are written group by group in [`Recording::sensors`] order.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        let header = LogEntry::Header {
            created_at: self.created_at.unwrap_or_else(Utc::now),
            interval_secs: self.interval_secs,
        };
        writeln!(writer, "{}", header.to_line()?)?;
        for channel in &self.channels {
            let entry = LogEntry::Channel {
                name: channel.name.clone(),
                shape: channel.shape.clone(),
            };
            writeln!(writer, "{}", entry.to_line()?)?;
        }
        for sensor in self.sensors() {
            for reading in self.readings(sensor) {
                writeln!(writer, "{}", LogEntry::Reading(reading.clone()).to_line()?)?;
            }
        }
        for event in &self.events {
            writeln!(writer, "{}", LogEntry::Event(event.clone()).to_line()?)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    const SAMPLE: &str = r#"{"kind":"header","created_at":"2026-01-01T00:00:00Z","interval_secs":1.0}
{"kind":"channel","name":"temperature","shape":[]}
{"kind":"channel","name":"accelerometer","shape":[3]}
{"kind":"reading","name":"temperature","sequence":1,"time":10,"value":21.5}

{"kind":"reading","name":"accelerometer","sequence":1,"time":10.0,"value":[0.0,0.0,1.0]}
{"kind":"reading","name":"temperature","sequence":2,"time":11.0,"value":21.75}
{"kind":"event","time":12.0,"sensor":"temperature","event":"missed"}
"#;

    #[test]
    fn test_parse_groups() {
        let recording = Recording::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(recording.interval_secs, 1.0);
        assert_eq!(recording.len(), 3);
        assert_eq!(recording.readings("temperature").len(), 2);
        assert_eq!(recording.readings("temperature")[0].time, 10.0);
        assert_eq!(
            recording.readings("accelerometer")[0].value,
            Value::Vector(vec![0.0, 0.0, 1.0])
        );
        assert_eq!(recording.sensors(), vec!["temperature", "accelerometer"]);
        assert_eq!(recording.shape("accelerometer"), Some(vec![3]));
        assert_eq!(recording.events().len(), 1);
        assert!(recording.readings("light").is_empty());
    }

    #[test]
    fn test_malformed_line_reports_number() {
        let text = "{\"kind\":\"channel\",\"name\":\"light\",\"shape\":[]}\n{not json}\n";
        let err = Recording::from_reader(text.as_bytes()).unwrap_err();
        assert!(matches!(err, SensorlineError::Serialization(ref m) if m.starts_with("line 2")));
    }

    #[test]
    fn test_missing_file_is_io() {
        let err = Recording::load("/nonexistent/sensorline/recording.jsonl").unwrap_err();
        assert!(matches!(err, SensorlineError::Io(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.jsonl");

        let mut recording = Recording::new(0.5);
        recording.declare_channel("light", vec![]);
        recording.push_reading(Reading::new("light", 1, 1.0, 300.0));
        recording.push_reading(Reading::new("light", 2, 1.5, 310.0));
        recording.save(&path).unwrap();

        let loaded = Recording::load(&path).unwrap();
        assert_eq!(loaded.interval_secs, 0.5);
        assert_eq!(loaded.readings("light"), recording.readings("light"));
    }

    #[test]
    fn test_shape_falls_back_to_first_reading() {
        let mut recording = Recording::new(1.0);
        recording.push_reading(Reading::new("accelerometer", 1, 1.0, vec![1.0, 2.0, 3.0]));
        assert_eq!(recording.shape("accelerometer"), Some(vec![3]));
        assert_eq!(recording.shape("pressure"), None);
    }
}
