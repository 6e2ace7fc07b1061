//! Cache feeder task: topic batches into the sensor cache

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::{Ingest, SensorCache};
use crate::error::Result;
use crate::pipeline::task::TaskOutcome;
use crate::pipeline::topic::TopicReceiver;

/// Feed the cache until cancelled
///
/// Each topic batch is ingested as one [`Ingest::Batch`]. On cancellation the
/// readings already queued on the receiver are ingested before returning. An
/// ingest failure (a sensor the cache does not know) ends the task with that
/// error.
pub async fn feed_cache(
    mut rx: TopicReceiver,
    cache: Arc<SensorCache>,
    cancel: CancellationToken,
) -> Result<TaskOutcome> {
    let mut ingested: u64 = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let rest = rx.try_get();
                ingested += rest.len() as u64;
                if !rest.is_empty() {
                    cache.ingest(rest)?;
                }
                tracing::debug!("Cache feeder stopped after {} readings", ingested);
                return Ok(TaskOutcome::Cancelled);
            }
            batch = rx.get() => {
                let batch = batch?;
                ingested += batch.len() as u64;
                cache.ingest(Ingest::from(batch))?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorlineError;
    use crate::pipeline::topic::Topic;
    use crate::types::Reading;

    #[tokio::test]
    async fn test_feeder_ingests_and_drains() {
        let topic = Topic::new(64);
        let cache = Arc::new(SensorCache::new(["light"], 100).unwrap());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(feed_cache(
            topic.subscribe("cache"),
            Arc::clone(&cache),
            cancel.clone(),
        ));

        for seq in 1..=3 {
            topic.put_nowait(Reading::new("light", seq, seq as f64, 100.0));
        }
        cancel.cancel();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, TaskOutcome::Cancelled);
        assert_eq!(cache.len("light"), 3);
    }

    #[tokio::test]
    async fn test_unknown_sensor_fails_task() {
        let topic = Topic::new(8);
        let cache = Arc::new(SensorCache::new(["light"], 10).unwrap());
        let task = tokio::spawn(feed_cache(
            topic.subscribe("cache"),
            cache,
            CancellationToken::new(),
        ));
        topic.put_nowait(Reading::new("pressure", 1, 1.0, 1000.0));
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, SensorlineError::UnknownSensor(_)));
    }
}
