//! Per-reading fan-out from the scheduler to the sinks
//!
//! Every reading is first appended to the data log (when one is configured)
//! and then put on the topic. A log failure propagates to the poll loop and
//! tears the run down; the topic never fails. The cache and the publisher
//! are fed from the topic, not from here.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::session::DataLog;
use crate::types::Reading;

use super::scheduler::{Consumer, Observer, SchedulerEvent};
use super::topic::Topic;

/// Data log shared between the poll loops and the run
pub type SharedLog = Arc<Mutex<Box<dyn DataLog>>>;

/// Wrap a log for sharing
pub fn share_log(log: Box<dyn DataLog>) -> SharedLog {
    Arc::new(Mutex::new(log))
}

/// Delivers readings to the log and the topic
#[derive(Clone)]
pub struct FanOut {
    log: Option<SharedLog>,
    topic: Topic,
    /// Put vector readings on the topic as their magnitude
    broadcast_magnitude: bool,
}

impl FanOut {
    pub fn new(log: Option<SharedLog>, topic: Topic, broadcast_magnitude: bool) -> Self {
        Self {
            log,
            topic,
            broadcast_magnitude,
        }
    }

    /// Log the raw reading, then broadcast it
    pub fn deliver(&self, reading: Reading) -> Result<()> {
        // Called on the poll loop's worker thread. The lock is never held
        // across an await, and an append is a write into the log's buffer;
        // it only touches the file once every `flush_every` readings.
        if let Some(log) = &self.log {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .append(&reading)?;
        }
        let broadcast = if self.broadcast_magnitude && reading.value.is_vector() {
            reading.to_magnitude()
        } else {
            reading
        };
        self.topic.put_nowait(broadcast);
        Ok(())
    }

    /// Consumer closure for the scheduler
    pub fn consumer(&self) -> Consumer {
        let fanout = self.clone();
        Arc::new(move |reading| fanout.deliver(reading))
    }
}

/// Observer that records scheduler events in the data log
///
/// Event logging is best effort: a failed write is only reported.
pub fn log_observer(log: SharedLog) -> Observer {
    Arc::new(move |event: &SchedulerEvent| {
        let result = log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .notify(&event.to_entry());
        if let Err(e) = result {
            tracing::warn!("Failed to log {} event: {}", event.sensor(), e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorlineError;
    use crate::session::EventEntry;
    use crate::types::Value;

    /// Log double that records what it was asked to do
    #[derive(Default)]
    struct RecordingLog {
        appended: Arc<Mutex<Vec<Reading>>>,
        fail: bool,
    }

    impl DataLog for RecordingLog {
        fn add_channel(&mut self, _name: &str, _shape: &[usize]) -> Result<()> {
            Ok(())
        }

        fn append(&mut self, reading: &Reading) -> Result<()> {
            if self.fail {
                return Err(SensorlineError::sink("data log", "disk full"));
            }
            self.appended.lock().unwrap().push(reading.clone());
            Ok(())
        }

        fn notify(&mut self, _event: &EventEntry) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_log_gets_raw_topic_gets_magnitude() {
        let appended = Arc::new(Mutex::new(Vec::new()));
        let log = RecordingLog {
            appended: Arc::clone(&appended),
            fail: false,
        };
        let topic = Topic::new(8);
        let mut rx = topic.subscribe("test");
        let fanout = FanOut::new(Some(share_log(Box::new(log))), topic, true);

        fanout
            .deliver(Reading::new("accelerometer", 1, 1.0, vec![0.0, 3.0, 4.0]))
            .unwrap();
        fanout.deliver(Reading::new("light", 1, 1.0, 250.0)).unwrap();

        let logged = appended.lock().unwrap().clone();
        assert_eq!(logged[0].value, Value::Vector(vec![0.0, 3.0, 4.0]));

        let broadcast = rx.get().await.unwrap();
        assert_eq!(broadcast[0].value, Value::Scalar(5.0));
        assert_eq!(broadcast[1].value, Value::Scalar(250.0));
    }

    #[tokio::test]
    async fn test_raw_broadcast_when_disabled() {
        let topic = Topic::new(8);
        let mut rx = topic.subscribe("test");
        let fanout = FanOut::new(None, topic, false);
        fanout
            .deliver(Reading::new("accelerometer", 1, 1.0, vec![1.0, 0.0, 0.0]))
            .unwrap();
        assert!(rx.get().await.unwrap()[0].value.is_vector());
    }

    #[test]
    fn test_log_failure_propagates_and_skips_topic() {
        let topic = Topic::new(8);
        let mut rx = topic.subscribe("test");
        let log = RecordingLog {
            fail: true,
            ..Default::default()
        };
        let consumer = FanOut::new(Some(share_log(Box::new(log))), topic, true).consumer();
        assert!(consumer(Reading::new("light", 1, 1.0, 1.0)).is_err());
        assert!(rx.try_get().is_empty());
    }
}
