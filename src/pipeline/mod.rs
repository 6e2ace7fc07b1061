//! Telemetry pipeline: sources wired to sinks, run by cycle.
//!
//! # Architecture
//!
//! ```text
//!                              ┌──► [DataLog]      (raw readings, per cycle)
//! [Source] ──► [Scheduler] ──► [FanOut]
//!                              └──► [Topic] ──┬──► [cache feeder] ──► [SensorCache]
//!                                             ├──► [publisher]
//!                                             └──► [LiveFeed]
//! ```
//!
//! # Design
//!
//! - **One task per sensor** - each channel has its own poll loop, so a slow
//!   sensor never delays another.
//! - **Log first** - a reading reaches the topic only after it is durably
//!   appended; a log failure ends the run.
//! - **Topic never blocks** - slow receivers lose the oldest readings.
//! - **Scoped runs** - a [`PipelineRun`] acquires per-cycle collaborators and
//!   releases them in reverse order on every path.

pub mod fanout;
pub mod orchestrator;
pub mod run;
pub mod scheduler;
pub mod sinks;
pub mod task;
pub mod topic;

pub use fanout::{FanOut, SharedLog};
pub use orchestrator::{
    builtin_driver, DefaultRunFactory, DriverFactory, Orchestrator, OrchestratorSettings,
    PublisherSpec, RunFactory,
};
pub use run::{PipelineRun, RunContext, RunEnd, RunState};
pub use scheduler::{Consumer, IntervalScheduler, Observer, Scheduler, SchedulerEvent};
pub use sinks::{LineConnector, LinePublisher, Publisher, PublisherConnector};
pub use task::TaskOutcome;
pub use topic::{Topic, TopicReceiver, DEFAULT_TOPIC_CAPACITY};
