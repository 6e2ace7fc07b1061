//! Pub/sub publisher task
//!
//! Readings from the topic are published one record at a time on a named
//! channel. [`Publisher`] is the seam to a real broker; the shipped
//! [`LinePublisher`] writes `{"channel": .., "record": ..}` JSON lines to
//! stdout or a file, which is enough to pipe readings into another process.
//!
//! Publishing is optional for a run: when the publisher cannot connect or a
//! publish fails, the task logs a warning and ends with
//! [`TaskOutcome::Disabled`], and the rest of the run carries on.

use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::config::PublishTarget;
use crate::error::{Result, SensorlineError};
use crate::pipeline::task::TaskOutcome;
use crate::pipeline::topic::TopicReceiver;
use crate::types::Reading;

/// A connected publisher
#[async_trait]
pub trait Publisher: Send {
    /// Publish one record on `channel`
    async fn publish(&mut self, channel: &str, record: &serde_json::Value) -> Result<()>;

    /// Push out anything buffered
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens publisher connections
#[async_trait]
pub trait PublisherConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Publisher>>;
}

/// Publisher writing JSON lines
pub struct LinePublisher {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    published: u64,
}

impl LinePublisher {
    pub fn new(writer: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            writer,
            published: 0,
        }
    }

    /// Records published so far
    pub fn published(&self) -> u64 {
        self.published
    }
}

#[async_trait]
impl Publisher for LinePublisher {
    async fn publish(&mut self, channel: &str, record: &serde_json::Value) -> Result<()> {
        let mut line = serde_json::to_vec(&json!({ "channel": channel, "record": record }))?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .await
            .map_err(|e| SensorlineError::sink("publisher", e))?;
        self.published += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .await
            .map_err(|e| SensorlineError::sink("publisher", e))
    }
}

/// Connector for [`LinePublisher`]
#[derive(Debug, Clone)]
pub struct LineConnector {
    target: PublishTarget,
}

impl LineConnector {
    pub fn new(target: PublishTarget) -> Self {
        Self { target }
    }

    /// Connector appending to a file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(PublishTarget::File(path.into()))
    }
}

#[async_trait]
impl PublisherConnector for LineConnector {
    async fn connect(&self) -> Result<Box<dyn Publisher>> {
        let writer: Box<dyn AsyncWrite + Send + Unpin> = match &self.target {
            PublishTarget::Stdout => Box::new(tokio::io::stdout()),
            PublishTarget::File(path) => {
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| SensorlineError::sink("publisher", format!("{:?}: {}", path, e)))?;
                Box::new(tokio::io::BufWriter::new(file))
            }
        };
        Ok(Box::new(LinePublisher::new(writer)))
    }
}

/// Record form of a reading: `name`, `sequence`, `time` and `value`
pub fn to_record(reading: &Reading) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(reading)?)
}

/// Publish topic readings on `channel` until cancelled
pub async fn publish_readings(
    mut rx: TopicReceiver,
    connector: Arc<dyn PublisherConnector>,
    channel: String,
    cancel: CancellationToken,
) -> Result<TaskOutcome> {
    let mut publisher = match connector.connect().await {
        Ok(publisher) => publisher,
        Err(e) => {
            tracing::warn!("Publishing to {} disabled: {}", channel, e);
            return Ok(TaskOutcome::Disabled(e.to_string()));
        }
    };
    tracing::info!("Publishing data to channel {}", channel);

    loop {
        let (batch, cancelled) = tokio::select! {
            biased;
            _ = cancel.cancelled() => (rx.try_get(), true),
            batch = rx.get() => (batch?, false),
        };

        for reading in &batch {
            let record = to_record(reading)?;
            if let Err(e) = publisher.publish(&channel, &record).await {
                tracing::warn!("Publishing to {} disabled: {}", channel, e);
                return Ok(TaskOutcome::Disabled(e.to_string()));
            }
        }

        if cancelled {
            if let Err(e) = publisher.flush().await {
                tracing::warn!("Final publisher flush failed: {}", e);
            }
            return Ok(TaskOutcome::Cancelled);
        }
    }
}
