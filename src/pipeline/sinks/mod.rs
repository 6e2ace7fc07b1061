//! Sink tasks fed from the topic.

pub mod cache_sink;
pub mod publish_sink;

pub use cache_sink::feed_cache;
pub use publish_sink::{
    publish_readings, to_record, LineConnector, LinePublisher, Publisher, PublisherConnector,
};
