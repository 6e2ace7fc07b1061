//! Pipeline orchestrator: rotation cycles over pipeline runs
//!
//! The orchestrator owns what outlives a cycle (the topic and the cache) and
//! asks a [`RunFactory`] for fresh per-cycle collaborators each time a
//! [`PipelineRun`] is built. With a rotation interval, each cycle lasts that
//! long and the next one starts with a new log file and a re-opened source.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::SensorCache;
use crate::config::{PipelineConfig, PublishSettings};
use crate::dashboard::{Dashboard, DashboardConfig};
use crate::error::{Result, ResultExt, SensorlineError};
use crate::session::{DataLog, JsonLinesLog, LogFiles, Recording};
use crate::source::{DeviceDriver, LiveSource, ReplaySource, Source};

use super::run::{PipelineRun, RunContext, RunEnd};
use super::scheduler::{IntervalScheduler, Scheduler};
use super::sinks::{LineConnector, PublisherConnector};
use super::topic::{Topic, DEFAULT_TOPIC_CAPACITY};

/// Publisher wiring for one run
pub struct PublisherSpec {
    pub connector: Arc<dyn PublisherConnector>,
    pub channel: String,
}

/// Supplies the per-cycle collaborators of a run
///
/// Called once per cycle, in this order: source, log, scheduler, publisher.
pub trait RunFactory: Send {
    /// Open (or re-open) the source
    fn open_source(&mut self) -> Result<Source>;

    /// Open a fresh data log, if logging is enabled
    fn open_log(&mut self) -> Result<Option<Box<dyn DataLog>>>;

    /// A new, empty scheduler
    fn scheduler(&mut self) -> Box<dyn Scheduler>;

    /// Publisher wiring, if publishing is enabled
    fn publisher(&mut self) -> Option<PublisherSpec>;
}

/// Builds device drivers by device identifier
pub type DriverFactory = Box<dyn Fn(&str) -> Result<Box<dyn DeviceDriver>> + Send>;

/// Driver lookup for the built-in drivers
///
/// Only the mock device is built in; real devices are supplied by the
/// embedding application through [`DefaultRunFactory::with_driver_factory`].
pub fn builtin_driver(device: &str) -> Result<Box<dyn DeviceDriver>> {
    match device {
        #[cfg(feature = "mock-device")]
        crate::source::MOCK_DEVICE_ID => Ok(Box::new(crate::source::MockDriver::new())),
        _ => Err(SensorlineError::SourceUnavailable {
            device: device.to_string(),
            message: "no driver available for this device".to_string(),
        }),
    }
}

/// Run factory driven by a [`PipelineConfig`]
pub struct DefaultRunFactory {
    config: PipelineConfig,
    files: Option<LogFiles>,
    /// Recording loaded once and shared by every replay cycle
    replay: Option<Arc<Recording>>,
    drivers: DriverFactory,
}

impl DefaultRunFactory {
    /// Build a factory; loads the replay recording if one is configured
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let replay = match &config.replay {
            Some(path) => {
                tracing::info!("Replaying a data file {:?}", path);
                Some(Arc::new(
                    Recording::load(path).with_context(|| format!("loading replay {:?}", path))?,
                ))
            }
            None => None,
        };
        let files = config
            .log
            .data_dir
            .as_ref()
            .map(|dir| LogFiles::new(dir, config.log.prefix.clone()));
        Ok(Self {
            config,
            files,
            replay,
            drivers: Box::new(builtin_driver),
        })
    }

    /// Use a custom driver lookup for live devices
    pub fn with_driver_factory(mut self, drivers: DriverFactory) -> Self {
        self.drivers = drivers;
        self
    }

    /// Configuration this factory builds from
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl RunFactory for DefaultRunFactory {
    fn open_source(&mut self) -> Result<Source> {
        if let Some(recording) = &self.replay {
            return Ok(ReplaySource::new(Arc::clone(recording)).into());
        }
        let driver = (self.drivers)(&self.config.device)?;
        let live = LiveSource::connect(driver, &self.config.device, self.config.interval())?;
        Ok(live.into())
    }

    fn open_log(&mut self) -> Result<Option<Box<dyn DataLog>>> {
        let Some(files) = self.files.as_mut() else {
            return Ok(None);
        };
        let path = files.next_path()?;
        let log = JsonLinesLog::create(path, self.config.interval_secs, self.config.log.flush_every)?;
        Ok(Some(Box::new(log)))
    }

    fn scheduler(&mut self) -> Box<dyn Scheduler> {
        Box::new(IntervalScheduler::new(
            self.config.interval(),
            self.config.poll_timeout(),
        ))
    }

    fn publisher(&mut self) -> Option<PublisherSpec> {
        self.config
            .publish
            .as_ref()
            .map(|PublishSettings { channel, target }| PublisherSpec {
                connector: Arc::new(LineConnector::new(target.clone())),
                channel: channel.clone(),
            })
    }
}

/// Orchestrator settings that do not depend on the factory
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Sensors to sample, in order
    pub sensors: Vec<String>,
    /// Rotation interval; a single cycle when `None`
    pub rotate: Option<Duration>,
    /// Broadcast vector readings as their magnitude
    pub broadcast_magnitude: bool,
    /// Cache capacity; no cache when `None`
    pub cache_capacity: Option<usize>,
    /// Topic capacity per receiver
    pub topic_capacity: usize,
    /// Seconds of data per live feed batch
    pub refresh_secs: f64,
}

impl OrchestratorSettings {
    pub fn new(sensors: Vec<String>) -> Self {
        Self {
            sensors,
            rotate: None,
            broadcast_magnitude: true,
            cache_capacity: None,
            topic_capacity: DEFAULT_TOPIC_CAPACITY,
            refresh_secs: 1.0,
        }
    }

    /// Settings derived from a config
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            sensors: config.sensors.clone(),
            rotate: config.rotate(),
            broadcast_magnitude: config.broadcast_magnitude,
            cache_capacity: config.cache_enabled().then_some(config.cache.capacity),
            topic_capacity: DEFAULT_TOPIC_CAPACITY,
            refresh_secs: config.dashboard.as_ref().map_or(1.0, |d| d.refresh_secs),
        }
    }
}

/// Runs reconfiguration cycles until stopped
pub struct Orchestrator {
    settings: OrchestratorSettings,
    topic: Topic,
    cache: Option<Arc<SensorCache>>,
    factory: Box<dyn RunFactory>,
    cycles: u64,
}

impl Orchestrator {
    pub fn new(settings: OrchestratorSettings, factory: Box<dyn RunFactory>) -> Result<Self> {
        if settings.sensors.is_empty() {
            return Err(SensorlineError::Config("no sensors configured".to_string()));
        }
        let cache = match settings.cache_capacity {
            Some(capacity) => Some(Arc::new(SensorCache::new(
                settings.sensors.iter().cloned(),
                capacity,
            )?)),
            None => None,
        };
        Ok(Self {
            topic: Topic::new(settings.topic_capacity),
            settings,
            cache,
            factory,
            cycles: 0,
        })
    }

    /// Validate a config and build an orchestrator with the default factory
    ///
    /// When the config asks for a cache preload, the cache is seeded from
    /// that recording.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let settings = OrchestratorSettings::from_config(&config);
        let preload: Option<(PathBuf, usize)> = config
            .cache
            .preload
            .clone()
            .map(|path| (path, config.cache.preload_count));
        let orchestrator = Self::new(settings, Box::new(DefaultRunFactory::new(config)?))?;

        if let (Some(cache), Some((path, count))) = (&orchestrator.cache, preload) {
            let recording = Recording::load(&path)
                .with_context(|| format!("loading cache preload {:?}", path))?;
            let loaded = cache.preload(&recording, count)?;
            tracing::info!("Cache preloaded with {} readings from {:?}", loaded, path);
        }
        Ok(orchestrator)
    }

    /// The broadcast topic
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The cache, if enabled
    pub fn cache(&self) -> Option<Arc<SensorCache>> {
        self.cache.clone()
    }

    /// Dashboard over the cache and topic, if the cache is enabled
    pub fn dashboard(&self) -> Option<Dashboard> {
        let cache = self.cache.clone()?;
        let config = DashboardConfig {
            refresh: self.settings.refresh_secs,
            sensors: self.settings.sensors.clone(),
        };
        Some(Dashboard::new(config, cache, self.topic.clone()))
    }

    /// Number of cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn context(&self) -> RunContext {
        RunContext {
            sensors: self.settings.sensors.clone(),
            topic: self.topic.clone(),
            cache: self.cache.clone(),
            broadcast_magnitude: self.settings.broadcast_magnitude,
        }
    }

    /// Run cycles until `stop` fires or a run fails
    ///
    /// A startup failure of any cycle is returned immediately; nothing is
    /// retried.
    pub async fn run(&mut self, stop: CancellationToken) -> Result<()> {
        let ctx = self.context();
        loop {
            if stop.is_cancelled() {
                return Ok(());
            }
            self.cycles += 1;
            tracing::info!("Starting cycle {}", self.cycles);

            let mut run = PipelineRun::start(self.factory.as_mut(), &ctx).await?;
            let outcome = run.supervise(&stop, self.settings.rotate).await;
            let drained = run.drain().await;

            match (outcome, drained) {
                (Ok(RunEnd::Rotate), Ok(())) => continue,
                (Ok(RunEnd::Stopped), Ok(())) => return Ok(()),
                (Ok(_), Err(e)) => return Err(e.with_context("draining run")),
                (Err(e), drained) => {
                    if let Err(d) = drained {
                        tracing::warn!("Drain after failure also failed: {}", d);
                    }
                    return Err(e);
                }
            }
        }
    }
}
