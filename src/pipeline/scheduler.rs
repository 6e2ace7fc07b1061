//! Periodic sensor polling
//!
//! A [`Scheduler`] polls every registered channel once per interval and hands
//! each reading to the channel's consumer. A poll that exceeds its timeout is
//! a missed sample and a poll that fails is a poll error; neither stops the
//! loop, both are reported to observers as [`SchedulerEvent`]s. A consumer
//! that fails, on the other hand, ends the loop and surfaces through
//! [`Scheduler::failed`].
//!
//! # Shutdown
//!
//! [`Scheduler::stop`] only signals. Each poll loop checks the signal between
//! polls, so an in-flight poll completes and its reading is delivered before
//! the loop exits. [`Scheduler::join`] waits for that.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SensorlineError};
use crate::session::EventEntry;
use crate::source::SensorChannel;
use crate::types::{now_secs, Reading};

/// Receives every reading of one channel
pub type Consumer = Arc<dyn Fn(Reading) -> Result<()> + Send + Sync>;

/// Receives scheduler debug events
pub type Observer = Arc<dyn Fn(&SchedulerEvent) + Send + Sync>;

/// Debug events emitted by the poll loops
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// The poll did not finish within its timeout
    Missed { sensor: String, time: f64 },
    /// The poll returned an error
    PollError {
        sensor: String,
        time: f64,
        message: String,
    },
}

impl SchedulerEvent {
    /// Sensor the event concerns
    pub fn sensor(&self) -> &str {
        match self {
            SchedulerEvent::Missed { sensor, .. } | SchedulerEvent::PollError { sensor, .. } => {
                sensor
            }
        }
    }

    /// Log entry form of this event
    pub fn to_entry(&self) -> EventEntry {
        match self {
            SchedulerEvent::Missed { sensor, time } => EventEntry {
                time: *time,
                sensor: sensor.clone(),
                event: "missed".to_string(),
                detail: None,
            },
            SchedulerEvent::PollError {
                sensor,
                time,
                message,
            } => EventEntry {
                time: *time,
                sensor: sensor.clone(),
                event: "poll_error".to_string(),
                detail: Some(message.clone()),
            },
        }
    }
}

/// Periodic poller of sensor channels
#[async_trait]
pub trait Scheduler: Send {
    /// Register a channel and the consumer of its readings
    ///
    /// Only valid before [`Scheduler::start`].
    fn register(&mut self, channel: Box<dyn SensorChannel>, consumer: Consumer) -> Result<()>;

    /// Add an observer for debug events
    fn add_observer(&mut self, observer: Observer);

    /// Start polling every registered channel
    fn start(&mut self) -> Result<()>;

    /// Signal all poll loops to stop (non-blocking)
    fn stop(&self);

    /// Wait until every poll loop has exited
    async fn join(&mut self) -> Result<()>;

    /// Resolves with the error of the first poll loop that fails
    ///
    /// Never resolves while all loops are healthy. Cancel safe.
    async fn failed(&mut self) -> SensorlineError;

    /// Names of registered sensors
    fn sensors(&self) -> Vec<String>;
}

/// Scheduler built on `tokio::time::interval`, one task per channel
pub struct IntervalScheduler {
    interval: Duration,
    timeout: Duration,
    pending: Vec<(Box<dyn SensorChannel>, Consumer)>,
    sensors: Vec<String>,
    observers: Vec<Observer>,
    stop: CancellationToken,
    tasks: JoinSet<Result<()>>,
    started: bool,
}

impl IntervalScheduler {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            pending: Vec::new(),
            sensors: Vec::new(),
            observers: Vec::new(),
            stop: CancellationToken::new(),
            tasks: JoinSet::new(),
            started: false,
        }
    }

    /// Polling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of poll loops still running
    pub fn running(&self) -> usize {
        self.tasks.len()
    }
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    fn register(&mut self, channel: Box<dyn SensorChannel>, consumer: Consumer) -> Result<()> {
        if self.started {
            return Err(SensorlineError::Task(format!(
                "cannot register {} on a started scheduler",
                channel.sensor()
            )));
        }
        self.sensors.push(channel.sensor().to_string());
        self.pending.push((channel, consumer));
        Ok(())
    }

    fn add_observer(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(SensorlineError::Task("scheduler already started".to_string()));
        }
        self.started = true;
        let observers: Arc<[Observer]> = self.observers.clone().into();
        for (channel, consumer) in self.pending.drain(..) {
            let poller = PollLoop {
                channel,
                consumer,
                observers: Arc::clone(&observers),
                interval: self.interval,
                timeout: self.timeout,
                stop: self.stop.clone(),
            };
            self.tasks.spawn(poller.run());
        }
        tracing::info!(
            "Scheduler started: {} sensors every {:?}",
            self.sensors.len(),
            self.interval
        );
        Ok(())
    }

    fn stop(&self) {
        self.stop.cancel();
    }

    async fn join(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            let result = joined.map_err(|e| SensorlineError::Task(format!("poll loop: {}", e)));
            if let Err(e) = result.and_then(|r| r) {
                tracing::error!("Poll loop ended with error: {}", e);
                first_error.get_or_insert(e);
            }
        }
        tracing::debug!("Scheduler joined");
        first_error.map_or(Ok(()), Err)
    }

    async fn failed(&mut self) -> SensorlineError {
        loop {
            match self.tasks.join_next().await {
                Some(Ok(Ok(()))) => continue,
                Some(Ok(Err(e))) => return e,
                Some(Err(e)) => return SensorlineError::Task(format!("poll loop: {}", e)),
                None => std::future::pending::<()>().await,
            }
        }
    }

    fn sensors(&self) -> Vec<String> {
        self.sensors.clone()
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// State of one channel's poll loop
struct PollLoop {
    channel: Box<dyn SensorChannel>,
    consumer: Consumer,
    observers: Arc<[Observer]>,
    interval: Duration,
    timeout: Duration,
    stop: CancellationToken,
}

impl PollLoop {
    async fn run(mut self) -> Result<()> {
        let sensor = self.channel.sensor().to_string();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let polled = tokio::time::timeout(self.timeout, self.channel.poll()).await;
            match polled {
                Ok(Ok(reading)) => (self.consumer)(reading)
                    .map_err(|e| e.with_context(format!("delivering {} reading", sensor)))?,
                Ok(Err(e)) => {
                    tracing::debug!("Poll of {} failed: {}", sensor, e);
                    self.emit(SchedulerEvent::PollError {
                        sensor: sensor.clone(),
                        time: now_secs(),
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    tracing::debug!("Poll of {} missed its {:?} timeout", sensor, self.timeout);
                    self.emit(SchedulerEvent::Missed {
                        sensor: sensor.clone(),
                        time: now_secs(),
                    });
                }
            }
        }

        tracing::debug!("Poll loop for {} stopped", sensor);
        Ok(())
    }

    fn emit(&self, event: SchedulerEvent) {
        for observer in self.observers.iter() {
            observer(&event);
        }
    }
}
