//! Error handling for sensorline
//!
//! This module defines the error taxonomy of the pipeline and a Result alias
//! for use throughout the crate.
//!
//! Startup errors (`SourceUnavailable`, `UnknownSensor`, `UnknownSensorGroup`,
//! `Config`) abort a run before any sensor is scheduled. `UnsupportedIngestKind`
//! is a programming error surfaced by the cache. Sink failures carry the name
//! of the sink that failed so the orchestrator can decide whether to contain
//! or escalate them.

use thiserror::Error;

/// Main error type for sensorline operations
#[derive(Error, Debug)]
pub enum SensorlineError {
    /// The device or its driver could not be reached at startup
    #[error("Source unavailable ({device}): {message}")]
    SourceUnavailable { device: String, message: String },

    /// A sensor group is missing from a replay recording
    #[error("Unknown sensor group: {0}")]
    UnknownSensorGroup(String),

    /// A sensor name outside the configured set
    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    /// The cache was handed a shape it cannot normalize
    #[error("Unsupported ingest kind: {0}")]
    UnsupportedIngestKind(String),

    /// Downsampling requested with an aggregate nobody registered
    #[error("Unknown aggregate: {0}")]
    UnknownAggregate(String),

    /// A sink was used after it was closed
    #[error("Sink closed: {0}")]
    SinkClosed(String),

    /// A sink failed while handling a reading
    #[error("Sink {sink} failed: {message}")]
    Sink { sink: String, message: String },

    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A supervised task ended in a way the run cannot survive
    #[error("Task error: {0}")]
    Task(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SensorlineError>,
    },
}

impl SensorlineError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SensorlineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a sink error for the named sink
    pub fn sink(sink: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SensorlineError::Sink {
            sink: sink.into(),
            message: message.to_string(),
        }
    }

    /// The error underneath any number of context layers
    pub fn root(&self) -> &SensorlineError {
        match self {
            SensorlineError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error must abort startup rather than be retried or contained
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self.root(),
            SensorlineError::SourceUnavailable { .. }
                | SensorlineError::UnknownSensor(_)
                | SensorlineError::UnknownSensorGroup(_)
                | SensorlineError::Config(_)
        )
    }
}

impl From<serde_json::Error> for SensorlineError {
    fn from(err: serde_json::Error) -> Self {
        SensorlineError::Serialization(err.to_string())
    }
}

/// Result type alias for sensorline operations
pub type Result<T> = std::result::Result<T, SensorlineError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| SensorlineError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SensorlineError::from(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SensorlineError::UnknownSensor("barometer".to_string());
        assert_eq!(err.to_string(), "Unknown sensor: barometer");
    }

    #[test]
    fn test_error_with_context() {
        let err = SensorlineError::UnknownSensorGroup("light".to_string());
        let with_ctx = err.with_context("Failed to open replay channel");
        assert!(with_ctx.to_string().contains("Failed to open replay channel"));
        assert!(matches!(
            with_ctx.root(),
            SensorlineError::UnknownSensorGroup(_)
        ));
    }

    #[test]
    fn test_source_unavailable_error() {
        let err = SensorlineError::SourceUnavailable {
            device: "AA:BB:CC".to_string(),
            message: "no route".to_string(),
        };
        assert!(err.to_string().contains("AA:BB:CC"));
        assert!(err.is_startup_fatal());
        assert!(!SensorlineError::sink("log", "disk full").is_startup_fatal());
    }
}
