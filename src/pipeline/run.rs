//! One pipeline run: acquisition, supervision and ordered teardown
//!
//! A run owns the per-cycle collaborators (source, data log, scheduler and
//! sink tasks). Shared state that outlives cycles (the topic and the cache)
//! is borrowed from the orchestrator through a [`RunContext`].
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Starting -> Running -> Draining -> Closed
//! ```
//!
//! Resources are released in reverse order of acquisition:
//!
//! 1. scheduler `stop()` then `join()` (in-flight polls finish)
//! 2. sink tasks cancelled and awaited (the cache feeder ingests what is queued)
//! 3. data log `close()`
//! 4. source `close()`
//!
//! The same order applies when startup fails half way and, best effort and
//! without waiting, when a run is dropped without [`PipelineRun::drain`].

use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cache::SensorCache;
use crate::error::{Result, SensorlineError};
use crate::source::Source;

use super::fanout::{log_observer, share_log, FanOut, SharedLog};
use super::orchestrator::RunFactory;
use super::scheduler::Scheduler;
use super::sinks::{feed_cache, publish_readings};
use super::task::{TaskExit, TaskOutcome};
use super::topic::Topic;

/// State of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Nothing acquired yet
    #[default]
    Idle,
    /// Acquiring collaborators
    Starting,
    /// Polling and delivering
    Running,
    /// Releasing collaborators
    Draining,
    /// Everything released (terminal)
    Closed,
}

impl RunState {
    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Starting => "Starting",
            RunState::Running => "Running",
            RunState::Draining => "Draining",
            RunState::Closed => "Closed",
        }
    }
}

/// Why supervision of a running run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The external stop signal fired
    Stopped,
    /// The rotation interval elapsed
    Rotate,
}

/// Shared state a run is built around
#[derive(Clone)]
pub struct RunContext {
    /// Sensors to register, in order
    pub sensors: Vec<String>,
    /// Broadcast topic (outlives runs)
    pub topic: Topic,
    /// Cache fed from the topic (outlives runs)
    pub cache: Option<Arc<SensorCache>>,
    /// Broadcast vector readings as their magnitude
    pub broadcast_magnitude: bool,
}

/// Decide whether a sink task that ended mid-run takes the run down
fn check_exit(name: &str, result: Result<TaskOutcome>) -> Result<()> {
    match result {
        Ok(TaskOutcome::Disabled(reason)) => {
            tracing::warn!("{} disabled for this run: {}", name, reason);
            Ok(())
        }
        Ok(outcome) if outcome.is_benign() => {
            tracing::debug!("{} ended: {:?}", name, outcome);
            Ok(())
        }
        Ok(outcome) => Err(SensorlineError::Task(format!(
            "{} ended unexpectedly ({:?})",
            name, outcome
        ))),
        Err(e) => Err(e.with_context(format!("{} failed", name))),
    }
}

/// A single pipeline run
pub struct PipelineRun {
    state: RunState,
    source: Option<Source>,
    log: Option<SharedLog>,
    scheduler: Option<Box<dyn Scheduler>>,
    tasks: JoinSet<TaskExit>,
    /// Cancels the sink tasks
    cancel: CancellationToken,
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRun {
    /// Create an idle run
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            source: None,
            log: None,
            scheduler: None,
            tasks: JoinSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Acquire everything and start polling
    ///
    /// On failure everything acquired so far is released in reverse order and
    /// the run is left `Closed`.
    pub async fn start(factory: &mut dyn RunFactory, ctx: &RunContext) -> Result<Self> {
        let mut run = Self::new();
        run.state = RunState::Starting;
        if let Err(e) = run.acquire(factory, ctx) {
            tracing::error!("Run startup failed: {}", e);
            run.release_now();
            return Err(e);
        }
        run.state = RunState::Running;
        Ok(run)
    }

    fn acquire(&mut self, factory: &mut dyn RunFactory, ctx: &RunContext) -> Result<()> {
        let source = self.source.insert(factory.open_source()?);
        tracing::info!("Source opened: {}", source.describe());

        if let Some(log) = factory.open_log()? {
            self.log = Some(share_log(log));
        }

        let scheduler = self.scheduler.insert(factory.scheduler());
        let fanout = FanOut::new(self.log.clone(), ctx.topic.clone(), ctx.broadcast_magnitude);
        for sensor in &ctx.sensors {
            let channel = source.channel(sensor)?;
            if let Some(log) = &self.log {
                log.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .add_channel(sensor, channel.shape())?;
            }
            scheduler.register(channel, fanout.consumer())?;
        }
        if let Some(log) = &self.log {
            scheduler.add_observer(log_observer(Arc::clone(log)));
        }

        // Subscribe before polling starts so no reading is missed
        if let Some(cache) = &ctx.cache {
            let rx = ctx.topic.subscribe("cache");
            let cache = Arc::clone(cache);
            let cancel = self.cancel.clone();
            self.tasks.spawn(async move {
                ("cache feeder".to_string(), feed_cache(rx, cache, cancel).await)
            });
        }
        if let Some(publish) = factory.publisher() {
            let rx = ctx.topic.subscribe("publisher");
            let cancel = self.cancel.clone();
            self.tasks.spawn(async move {
                let outcome = publish_readings(rx, publish.connector, publish.channel, cancel).await;
                ("publisher".to_string(), outcome)
            });
        }

        scheduler.start()
    }

    /// Current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Supervise the running tasks
    ///
    /// Returns when `stop` fires, when `rotate_after` elapses, or with an
    /// error when a poll loop or a sink task ends unexpectedly. A sink task
    /// ending with a benign outcome (see [`TaskOutcome::is_benign`]) is
    /// logged and supervision goes on.
    pub async fn supervise(
        &mut self,
        stop: &CancellationToken,
        rotate_after: Option<Duration>,
    ) -> Result<RunEnd> {
        let scheduler = self
            .scheduler
            .as_mut()
            .ok_or_else(|| SensorlineError::Task("run is not running".to_string()))?;

        let rotation = async {
            match rotate_after {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(rotation);

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    tracing::info!("Stop requested");
                    return Ok(RunEnd::Stopped);
                }
                _ = &mut rotation => {
                    tracing::info!("Rotation interval elapsed");
                    return Ok(RunEnd::Rotate);
                }
                err = scheduler.failed() => {
                    return Err(err.with_context("poll loop failed"));
                }
                Some(joined) = self.tasks.join_next() => {
                    let (name, result) = joined
                        .map_err(|e| SensorlineError::Task(format!("sink task: {}", e)))?;
                    check_exit(&name, result)?;
                }
            }
        }
    }

    /// Release everything in order
    ///
    /// Every step runs even when an earlier one fails; the first error is
    /// returned. Draining a closed run does nothing.
    pub async fn drain(&mut self) -> Result<()> {
        if matches!(self.state, RunState::Closed | RunState::Idle) {
            self.state = RunState::Closed;
            return Ok(());
        }
        self.state = RunState::Draining;
        let mut first_error: Option<SensorlineError> = None;

        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
            if let Err(e) = scheduler.join().await {
                first_error.get_or_insert(e);
            }
        }

        self.cancel.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((name, Ok(outcome))) => tracing::debug!("{} ended: {:?}", name, outcome),
                Ok((name, Err(e))) => {
                    tracing::error!("{} failed while draining: {}", name, e);
                    first_error.get_or_insert(e.with_context(format!("{} failed", name)));
                }
                Err(e) => {
                    first_error.get_or_insert(SensorlineError::Task(format!("sink task: {}", e)));
                }
            }
        }

        if let Some(log) = self.log.take() {
            if let Err(e) = log.lock().unwrap_or_else(PoisonError::into_inner).close() {
                first_error.get_or_insert(e);
            }
        }

        if let Some(mut source) = self.source.take() {
            source.close();
        }

        self.state = RunState::Closed;
        tracing::info!("Run closed");
        first_error.map_or(Ok(()), Err)
    }

    /// Release everything without waiting for tasks
    fn release_now(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        self.cancel.cancel();
        self.tasks.abort_all();
        if let Some(log) = self.log.take() {
            if let Err(e) = log.lock().unwrap_or_else(PoisonError::into_inner).close() {
                tracing::warn!("Failed to close data log: {}", e);
            }
        }
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        self.state = RunState::Closed;
    }
}

impl Drop for PipelineRun {
    fn drop(&mut self) {
        if !matches!(self.state, RunState::Closed | RunState::Idle) {
            tracing::warn!("Run dropped while {}, releasing", self.state.display_name());
            self.release_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(RunState::default(), RunState::Idle);
        assert_eq!(RunState::Draining.display_name(), "Draining");
    }

    #[test]
    fn test_benign_task_exits_keep_run_going() {
        check_exit("publisher", Ok(TaskOutcome::Disabled("refused".into()))).unwrap();
        check_exit("cache feeder", Ok(TaskOutcome::Cancelled)).unwrap();

        let err = check_exit("cache feeder", Ok(TaskOutcome::Finished)).unwrap_err();
        assert!(matches!(err, SensorlineError::Task(_)));

        let err = check_exit("publisher", Err(SensorlineError::sink("publisher", "reset"))).unwrap_err();
        assert!(matches!(err.root(), SensorlineError::Sink { .. }));
        assert!(err.to_string().contains("publisher failed"));
    }

    #[tokio::test]
    async fn test_drain_idle_run() {
        let mut run = PipelineRun::new();
        run.drain().await.unwrap();
        assert_eq!(run.state(), RunState::Closed);
        run.drain().await.unwrap();
    }
}
