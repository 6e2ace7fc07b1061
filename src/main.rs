//! sensorline - Main Entry Point
//!
//! `sensorline start` runs the telemetry pipeline until Ctrl-C or SIGTERM;
//! `sensorline inspect` summarizes a recorded data log.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sensorline::{
    analysis::{downsample, Aggregate},
    config::{DashboardSettings, PipelineConfig, PublishSettings},
    Orchestrator, Recording, SensorKind, SensorlineError,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sensor telemetry pipeline
#[derive(Parser, Debug)]
#[command(name = "sensorline", version, long_about = None)]
struct Cli {
    /// Also write logs to a daily rotating file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start sampling and fan readings out to the configured sinks
    Start(StartArgs),
    /// Print per-sensor counts and a downsampled summary of a recording
    Inspect {
        /// Recording (data log) to read
        file: PathBuf,

        /// Buckets in the per-sensor summary
        #[arg(long, default_value_t = 10)]
        buckets: usize,
    },
}

#[derive(Args, Debug, Default)]
struct StartArgs {
    /// Device identifier ("mock" for the built-in mock device)
    #[arg(long)]
    device: Option<String>,

    /// Sensors to sample (comma-separated)
    #[arg(long, value_delimiter = ',')]
    sensors: Option<Vec<String>>,

    /// Enable the cache and dashboard, serving assets from this directory
    #[arg(long, value_name = "ASSETS")]
    dashboard: Option<PathBuf>,

    /// Directory for rotating data logs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Rotation interval in seconds
    #[arg(long, value_name = "SECS")]
    rotate: Option<f64>,

    /// Publish readings on this channel
    #[arg(long)]
    channel: Option<String>,

    /// Replay a recording instead of sampling a device
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl StartArgs {
    /// Merge command-line overrides over a loaded config
    fn apply(self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(sensors) = self.sensors {
            config.sensors = sensors
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(assets) = self.dashboard {
            let refresh_secs = config
                .dashboard
                .as_ref()
                .map_or(DashboardSettings::default().refresh_secs, |d| d.refresh_secs);
            config.dashboard = Some(DashboardSettings {
                assets,
                refresh_secs,
            });
        }
        if let Some(dir) = self.data_dir {
            config.log.data_dir = Some(dir);
        }
        if let Some(rotate) = self.rotate {
            config.rotate_secs = Some(rotate);
        }
        if let Some(channel) = self.channel {
            let target = config.publish.take().unwrap_or_default().target;
            config.publish = Some(PublishSettings { channel, target });
        }
        if let Some(replay) = self.replay {
            config.replay = Some(replay);
        }
        config
    }
}

fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {:?}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, "sensorline.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sensorline=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Cancel `stop` on Ctrl-C or SIGTERM
fn spawn_signal_handler(stop: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("Shutdown signal received");
        stop.cancel();
    });
}

async fn start(args: StartArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let config = args.apply(config);
    let assets = config.dashboard.as_ref().map(|d| d.assets.clone());

    let mut orchestrator = Orchestrator::from_config(config)?;
    let stop = CancellationToken::new();
    spawn_signal_handler(stop.clone());

    if let Some(dashboard) = orchestrator.dashboard() {
        if let Some(assets) = assets.filter(|a| !a.is_dir()) {
            tracing::warn!("Dashboard assets directory {:?} not found", assets);
        }
        tracing::info!(
            "Dashboard enabled for {} sensors, refresh {}s",
            dashboard.config().sensors.len(),
            dashboard.config().refresh
        );
        let mut feed = dashboard.live_feed();
        let stop = stop.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    batch = feed.next_batch() => match batch {
                        Ok(batch) => tracing::debug!("Live feed batch of {} readings", batch.len()),
                        Err(e) => {
                            tracing::warn!("Live feed ended: {}", e);
                            break;
                        }
                    },
                }
            }
        });
    }

    if let Err(e) = orchestrator.run(stop).await {
        let context = failure_context(&e, orchestrator.cycles());
        return Err(anyhow::Error::new(e).context(context));
    }
    tracing::info!(
        "Pipeline stopped after {} cycle(s)",
        orchestrator.cycles()
    );
    Ok(())
}

/// Tell a pipeline that never got going apart from one that broke mid-run
fn failure_context(err: &SensorlineError, cycle: u64) -> String {
    if err.is_startup_fatal() {
        format!("pipeline failed to start (cycle {})", cycle)
    } else {
        format!("pipeline failed while running (cycle {})", cycle)
    }
}

fn inspect(file: &Path, buckets: usize) -> anyhow::Result<()> {
    let recording = Recording::load(file)?;
    match recording.created_at {
        Some(created_at) => println!("{} (recorded {})", file.display(), created_at.to_rfc3339()),
        None => println!("{}", file.display()),
    }
    println!(
        "interval {}s, {} readings, {} events",
        recording.interval_secs,
        recording.len(),
        recording.events().len()
    );

    for sensor in recording.sensors() {
        let readings = recording.readings(sensor);
        let shape = recording.shape(sensor).unwrap_or_default();
        let unit = sensor.parse::<SensorKind>().map_or("", |kind| kind.unit());
        println!();
        println!(
            "{:<16} {:>8} readings  shape {:?}  {}",
            sensor,
            readings.len(),
            shape,
            unit
        );

        let series: Vec<(f64, f64)> = readings
            .iter()
            .map(|r| (r.time, r.value.as_scalar()))
            .collect();
        for (time, value) in downsample(&series, Aggregate::Mean, buckets) {
            println!("  {:>16.3}  {:>12.4}", time, value);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_tracing(cli.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Start(args) => {
            tracing::info!("Starting sensorline");
            start(args).await
        }
        Command::Inspect { file, buckets } => inspect(&file, buckets),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
