//! Journaling doubles for the pipeline collaborators
//!
//! Every double writes what happened to a shared [`Journal`] so tests can
//! assert on the order in which a run acquires and releases things.

use async_trait::async_trait;
use sensorline::pipeline::{
    Consumer, IntervalScheduler, Observer, PublisherSpec, RunFactory, Scheduler,
};
use sensorline::pipeline::{Publisher, PublisherConnector};
use sensorline::session::{DataLog, EventEntry};
use sensorline::source::{DeviceDriver, LiveSource, SensorChannel, SensorReader};
use sensorline::{Reading, Result, SensorKind, SensorlineError, Source, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered record of calls across all doubles
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

/// Device driver whose sensors count up from 1
pub struct JournalDriver {
    journal: Journal,
    connected: bool,
    refuse: bool,
}

impl JournalDriver {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            connected: false,
            refuse: false,
        }
    }

    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }
}

impl DeviceDriver for JournalDriver {
    fn connect(&mut self, device: &str) -> Result<()> {
        if self.refuse {
            return Err(SensorlineError::SourceUnavailable {
                device: device.to_string(),
                message: "unplugged".to_string(),
            });
        }
        self.connected = true;
        self.journal.push("source.connect");
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.journal.push("source.close");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn open_sensor(&self, kind: SensorKind, _interval: Duration) -> Result<Box<dyn SensorReader>> {
        Ok(Box::new(CountingReader { kind, count: 0 }))
    }
}

struct CountingReader {
    kind: SensorKind,
    count: u64,
}

#[async_trait]
impl SensorReader for CountingReader {
    async fn read(&mut self) -> Result<Value> {
        self.count += 1;
        let n = self.count as f64;
        Ok(match self.kind.shape() {
            [] => Value::Scalar(n),
            _ => Value::Vector(vec![0.0, 3.0 * n, 4.0 * n]),
        })
    }
}

/// Shared view of what a [`JournalLog`] received
#[derive(Clone, Default)]
pub struct LogContents(Arc<Mutex<Vec<Reading>>>);

impl LogContents {
    pub fn readings(&self) -> Vec<Reading> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, sensor: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.sensor == sensor)
            .count()
    }
}

/// Data log keeping readings in memory
pub struct JournalLog {
    journal: Journal,
    contents: LogContents,
    closed: bool,
    fail_appends: bool,
}

impl JournalLog {
    pub fn new(journal: Journal, contents: LogContents) -> Self {
        Self {
            journal,
            contents,
            closed: false,
            fail_appends: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_appends = true;
        self
    }
}

impl DataLog for JournalLog {
    fn add_channel(&mut self, name: &str, _shape: &[usize]) -> Result<()> {
        self.journal.push(format!("log.add_channel:{}", name));
        Ok(())
    }

    fn append(&mut self, reading: &Reading) -> Result<()> {
        if self.closed {
            self.journal.push("log.append_after_close");
            return Err(SensorlineError::SinkClosed("journal log".to_string()));
        }
        if self.fail_appends {
            return Err(SensorlineError::sink("journal log", "disk full"));
        }
        self.contents.0.lock().unwrap().push(reading.clone());
        Ok(())
    }

    fn notify(&mut self, event: &EventEntry) -> Result<()> {
        self.journal.push(format!("log.event:{}", event.event));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.journal.push("log.close");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Interval scheduler that journals stop and join
pub struct JournalScheduler {
    inner: IntervalScheduler,
    journal: Journal,
}

impl JournalScheduler {
    pub fn new(journal: Journal, interval: Duration) -> Self {
        Self {
            inner: IntervalScheduler::new(interval, interval),
            journal,
        }
    }
}

#[async_trait]
impl Scheduler for JournalScheduler {
    fn register(&mut self, channel: Box<dyn SensorChannel>, consumer: Consumer) -> Result<()> {
        self.inner.register(channel, consumer)
    }

    fn add_observer(&mut self, observer: Observer) {
        self.inner.add_observer(observer)
    }

    fn start(&mut self) -> Result<()> {
        self.journal.push("scheduler.start");
        self.inner.start()
    }

    fn stop(&self) {
        self.journal.push("scheduler.stop");
        self.inner.stop()
    }

    async fn join(&mut self) -> Result<()> {
        let joined = self.inner.join().await;
        self.journal.push("scheduler.join");
        joined
    }

    async fn failed(&mut self) -> SensorlineError {
        self.inner.failed().await
    }

    fn sensors(&self) -> Vec<String> {
        self.inner.sensors()
    }
}

/// Publisher connector that counts records and can refuse or break
pub struct CountingConnector {
    published: Arc<AtomicU64>,
    refuse: bool,
    fail_after: Option<u64>,
}

impl CountingConnector {
    pub fn new() -> Self {
        Self {
            published: Arc::new(AtomicU64::new(0)),
            refuse: false,
            fail_after: None,
        }
    }

    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn failing_after(mut self, records: u64) -> Self {
        self.fail_after = Some(records);
        self
    }

    pub fn published(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.published)
    }
}

#[async_trait]
impl PublisherConnector for CountingConnector {
    async fn connect(&self) -> Result<Box<dyn Publisher>> {
        if self.refuse {
            return Err(SensorlineError::sink("publisher", "connection refused"));
        }
        Ok(Box::new(CountingPublisher {
            published: Arc::clone(&self.published),
            fail_after: self.fail_after,
        }))
    }
}

struct CountingPublisher {
    published: Arc<AtomicU64>,
    fail_after: Option<u64>,
}

#[async_trait]
impl Publisher for CountingPublisher {
    async fn publish(&mut self, _channel: &str, _record: &serde_json::Value) -> Result<()> {
        let published = self.published.load(Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| published >= limit) {
            return Err(SensorlineError::sink("publisher", "connection reset"));
        }
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Run factory assembling journaling doubles
pub struct JournalFactory {
    pub journal: Journal,
    pub contents: LogContents,
    pub interval: Duration,
    pub refuse_connect: bool,
    pub failing_log: bool,
    pub connector: Option<Arc<CountingConnector>>,
    pub logs_opened: u32,
}

impl JournalFactory {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            contents: LogContents::default(),
            interval: Duration::from_millis(100),
            refuse_connect: false,
            failing_log: false,
            connector: None,
            logs_opened: 0,
        }
    }

    pub fn with_publisher(mut self, connector: CountingConnector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }
}

impl RunFactory for JournalFactory {
    fn open_source(&mut self) -> Result<Source> {
        let mut driver = JournalDriver::new(self.journal.clone());
        if self.refuse_connect {
            driver = driver.refusing();
        }
        Ok(LiveSource::connect(Box::new(driver), "bench-rig", self.interval)?.into())
    }

    fn open_log(&mut self) -> Result<Option<Box<dyn DataLog>>> {
        self.logs_opened += 1;
        self.journal.push("log.open");
        let log = JournalLog::new(self.journal.clone(), self.contents.clone());
        let log = if self.failing_log { log.failing() } else { log };
        Ok(Some(Box::new(log)))
    }

    fn scheduler(&mut self) -> Box<dyn Scheduler> {
        Box::new(JournalScheduler::new(self.journal.clone(), self.interval))
    }

    fn publisher(&mut self) -> Option<PublisherSpec> {
        self.connector.as_ref().map(|connector| PublisherSpec {
            connector: Arc::clone(connector) as Arc<dyn PublisherConnector>,
            channel: "lab".to_string(),
        })
    }
}
