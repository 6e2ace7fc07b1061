//! In-process dashboard API
//!
//! The dashboard offers three queries, mirroring what a web front end needs:
//!
//! - [`Dashboard::config`] - sensor list and live refresh period
//! - [`Dashboard::history`] - a downsampled view of the cached window
//! - [`Dashboard::live_feed`] - batches of fresh readings from the topic
//!
//! Serving these over HTTP is left to the embedding application.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analysis::downsample_by_name;
use crate::cache::{Sample, SensorCache};
use crate::error::Result;
use crate::pipeline::{Topic, TopicReceiver};
use crate::types::Reading;

/// Dashboard configuration as served to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Seconds of data per live feed batch
    pub refresh: f64,
    /// Sensors available for queries
    #[serde(rename = "data")]
    pub sensors: Vec<String>,
}

/// Queries over the cache and the topic
#[derive(Debug, Clone)]
pub struct Dashboard {
    config: DashboardConfig,
    cache: Arc<SensorCache>,
    topic: Topic,
}

impl Dashboard {
    pub fn new(config: DashboardConfig, cache: Arc<SensorCache>, topic: Topic) -> Self {
        Self {
            config,
            cache,
            topic,
        }
    }

    /// Sensor list and refresh period
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Downsampled history of one sensor
    ///
    /// Vector values are projected to their magnitude before bucketing.
    /// Fails with `UnknownSensor` or `UnknownAggregate`.
    pub fn history(&self, sensor: &str, aggregate: &str, buckets: usize) -> Result<Vec<(f64, f64)>> {
        let series = self.cache.series(sensor)?;
        downsample_by_name(&series, aggregate, buckets)
    }

    /// Every cached sample of one sensor, oldest first
    pub fn raw(&self, sensor: &str) -> Result<Vec<Sample>> {
        self.cache.snapshot(sensor)
    }

    /// Subscribe to fresh readings
    pub fn live_feed(&self) -> LiveFeed {
        LiveFeed {
            rx: self.topic.subscribe("live feed"),
            refresh: self.config.refresh,
            pending: Vec::new(),
        }
    }
}

/// Stream of reading batches, each spanning at least the refresh period
#[derive(Debug)]
pub struct LiveFeed {
    rx: TopicReceiver,
    refresh: f64,
    pending: Vec<Reading>,
}

impl LiveFeed {
    /// Wait for the next batch
    ///
    /// Readings accumulate until the time between the first and the last
    /// one, rounded to whole seconds, reaches the refresh period.
    pub async fn next_batch(&mut self) -> Result<Vec<Reading>> {
        loop {
            let batch = self.rx.get().await?;
            self.pending.extend(batch);
            if self.ready() {
                return Ok(std::mem::take(&mut self.pending));
            }
        }
    }

    /// Readings accumulated towards the next batch
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn ready(&self) -> bool {
        match (self.pending.first(), self.pending.last()) {
            (Some(first), Some(last)) => (last.time - first.time).round() >= self.refresh,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorlineError;

    fn dashboard(refresh: f64) -> (Dashboard, Topic) {
        let cache = Arc::new(SensorCache::new(["light", "accelerometer"], 100).unwrap());
        for i in 0..10 {
            cache
                .ingest(Reading::new("light", i, i as f64, (i * 10) as f64))
                .unwrap();
        }
        let topic = Topic::new(64);
        let config = DashboardConfig {
            refresh,
            sensors: vec!["light".into(), "accelerometer".into()],
        };
        (Dashboard::new(config, cache, topic.clone()), topic)
    }

    #[test]
    fn test_config_json() {
        let (dashboard, _) = dashboard(2.0);
        let json = serde_json::to_value(dashboard.config()).unwrap();
        assert_eq!(json["refresh"], 2.0);
        assert_eq!(json["data"][1], "accelerometer");
    }

    #[test]
    fn test_history() {
        let (dashboard, _) = dashboard(1.0);
        let history = dashboard.history("light", "max", 5).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0], (0.0, 10.0));
        assert!(dashboard.history("accelerometer", "mean", 5).unwrap().is_empty());
        assert!(matches!(
            dashboard.history("light", "p99", 5),
            Err(SensorlineError::UnknownAggregate(_))
        ));
        assert!(matches!(
            dashboard.history("sound", "mean", 5),
            Err(SensorlineError::UnknownSensor(_))
        ));
        assert_eq!(dashboard.raw("light").unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_live_feed_batches_by_refresh() {
        let (dashboard, topic) = dashboard(2.0);
        let mut feed = dashboard.live_feed();

        topic.put_nowait(Reading::new("light", 1, 100.0, 1.0));
        topic.put_nowait(Reading::new("light", 2, 101.0, 1.0));
        topic.put_nowait(Reading::new("light", 3, 102.0, 1.0));
        topic.put_nowait(Reading::new("light", 4, 103.0, 1.0));

        let batch = feed.next_batch().await.unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(feed.pending(), 0);
    }

    #[tokio::test]
    async fn test_live_feed_waits_for_span() {
        let (dashboard, topic) = dashboard(2.0);
        let mut feed = dashboard.live_feed();

        topic.put_nowait(Reading::new("light", 1, 100.0, 1.0));
        let waiting = tokio::time::timeout(std::time::Duration::from_millis(50), feed.next_batch()).await;
        assert!(waiting.is_err());
        assert_eq!(feed.pending(), 1);

        topic.put_nowait(Reading::new("light", 2, 101.6, 1.0));
        let batch = feed.next_batch().await.unwrap();
        // 1.6 s rounds to 2
        assert_eq!(batch.len(), 2);
    }
}
