//! Broadcast topic between the fan-out and the sink tasks
//!
//! The topic is a thin layer over `tokio::sync::broadcast`. Publishing never
//! blocks: a receiver that falls more than the topic capacity behind loses the
//! oldest readings and logs a warning. Receivers read in batches, which is
//! what every consumer (cache feeder, publisher, live feed) wants anyway.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::error::{Result, SensorlineError};
use crate::types::Reading;

/// Default number of readings buffered per receiver
pub const DEFAULT_TOPIC_CAPACITY: usize = 4096;

/// Multi-consumer broadcast of readings
#[derive(Debug, Clone)]
pub struct Topic {
    tx: broadcast::Sender<Reading>,
}

impl Default for Topic {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl Topic {
    /// Create a topic buffering up to `capacity` readings per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish without waiting
    ///
    /// Returns the number of receivers the reading was queued for. Having no
    /// receivers is not an error: the reading is simply dropped.
    pub fn put_nowait(&self, reading: Reading) -> usize {
        self.tx.send(reading).unwrap_or(0)
    }

    /// Attach a new receiver; it sees readings published from now on
    pub fn subscribe(&self, name: impl Into<String>) -> TopicReceiver {
        TopicReceiver {
            name: name.into(),
            rx: self.tx.subscribe(),
            dropped: 0,
        }
    }
}

/// Batch-reading end of a [`Topic`]
#[derive(Debug)]
pub struct TopicReceiver {
    name: String,
    rx: broadcast::Receiver<Reading>,
    /// Readings lost to lagging
    dropped: u64,
}

impl TopicReceiver {
    /// Wait for at least one reading and return everything queued
    ///
    /// Fails only when every sender is gone. Cancel safe.
    pub async fn get(&mut self) -> Result<Vec<Reading>> {
        loop {
            match self.rx.recv().await {
                Ok(first) => {
                    let mut batch = vec![first];
                    batch.extend(self.try_get());
                    return Ok(batch);
                }
                Err(RecvError::Lagged(n)) => self.lagged(n),
                Err(RecvError::Closed) => {
                    return Err(SensorlineError::Task(format!(
                        "topic closed under receiver {}",
                        self.name
                    )))
                }
            }
        }
    }

    /// Everything queued right now, possibly nothing
    pub fn try_get(&mut self) -> Vec<Reading> {
        let mut batch = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(reading) => batch.push(reading),
                Err(TryRecvError::Lagged(n)) => self.lagged(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return batch,
            }
        }
    }

    /// Receiver name used in log messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total readings this receiver lost by lagging
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn lagged(&mut self, n: u64) {
        self.dropped += n;
        tracing::warn!(
            "Topic receiver {} lagged, dropped {} readings ({} total)",
            self.name,
            n,
            self.dropped
        );
    }
}
