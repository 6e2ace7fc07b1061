//! # sensorline: Sensor Telemetry Pipeline
//!
//! Samples a fixed set of sensors (or replays a recording of them) at a fixed
//! interval and fans every reading out to a rotating data log, an in-memory
//! cache for dashboard queries, and an optional pub/sub publisher.
//!
//! ## Architecture
//!
//! - **Source**: a live device behind a [`source::DeviceDriver`], or a
//!   recording cycled endlessly
//! - **Scheduler**: one poll loop per sensor on a tokio runtime
//! - **Fan-out**: log first, then a non-blocking broadcast topic
//! - **Sinks**: the cache feeder and the publisher, fed from the topic
//! - **Orchestrator**: rotation cycles, each with its own log file
//!
//! ## Configuration
//!
//! The pipeline reads an optional TOML file from the platform config
//! directory under `sensorline/config.toml`; see [`config`].
//!
//! ## Example
//!
//! ```no_run
//! use sensorline::{Orchestrator, PipelineConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> sensorline::Result<()> {
//! let config = PipelineConfig {
//!     sensors: vec!["temperature".into(), "accelerometer".into()],
//!     ..Default::default()
//! };
//! let mut orchestrator = Orchestrator::from_config(config)?;
//!
//! let stop = CancellationToken::new();
//! let stopper = stop.clone();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     stopper.cancel();
//! });
//!
//! orchestrator.run(stop).await
//! # }
//! ```

pub mod analysis;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use analysis::{downsample, Aggregate};
pub use cache::{Ingest, SensorCache};
pub use config::PipelineConfig;
pub use dashboard::{Dashboard, DashboardConfig, LiveFeed};
pub use error::{Result, ResultExt, SensorlineError};
pub use pipeline::{Orchestrator, OrchestratorSettings, PipelineRun, RunFactory};
pub use session::{DataLog, JsonLinesLog, Recording};
pub use source::{SensorChannel, Source};
pub use types::{Reading, SensorKind, Value};
