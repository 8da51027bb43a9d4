use std::sync::Arc;

use async_trait::async_trait;
use metrics::{counter, gauge};

use crate::api::IngestError;
use crate::event::EventEnvelope;
use crate::redis::Client;

pub const DEFAULT_QUEUE_KEY: &str = "events:queue";

#[async_trait]
pub trait EventSink {
    async fn send(&self, event: EventEnvelope) -> Result<(), IngestError>;
}

/// Stdout sink for local development, keeps the pipeline observable without
/// a store.
pub struct PrintSink {}

#[async_trait]
impl EventSink for PrintSink {
    async fn send(&self, event: EventEnvelope) -> Result<(), IngestError> {
        tracing::info!("event: {:?}", event);
        counter!("ingest_events_ingested_total").increment(1);

        Ok(())
    }
}

/// Durable queue: RPUSH of the JSON-encoded envelope onto a named list,
/// drained by the external batch aggregator. The write is confirmed by the
/// store before the caller sees success.
pub struct RedisQueueSink {
    redis: Arc<dyn Client + Send + Sync>,
    queue_key: String,
}

impl RedisQueueSink {
    pub fn new(redis: Arc<dyn Client + Send + Sync>, queue_key: String) -> RedisQueueSink {
        RedisQueueSink { redis, queue_key }
    }
}

#[async_trait]
impl EventSink for RedisQueueSink {
    async fn send(&self, event: EventEnvelope) -> Result<(), IngestError> {
        let payload = serde_json::to_string(&event).map_err(|e| {
            tracing::error!(event_id = %event.event_id, "failed to serialize envelope: {}", e);
            IngestError::NonRetryableSinkError
        })?;

        match self.redis.rpush(self.queue_key.clone(), payload).await {
            Ok(queue_depth) => {
                counter!("ingest_events_ingested_total").increment(1);
                gauge!("ingest_queue_depth").set(queue_depth as f64);
                tracing::debug!(
                    event_id = %event.event_id,
                    queue_depth,
                    "event queued"
                );
                Ok(())
            }
            Err(e) => {
                counter!("ingest_events_dropped_total", "cause" => "queue_write_failed")
                    .increment(1);
                tracing::error!(
                    event_id = %event.event_id,
                    queue_key = %self.queue_key,
                    "failed to push event to queue: {}",
                    e
                );
                Err(IngestError::StoreUnavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::{EventSink, RedisQueueSink, DEFAULT_QUEUE_KEY};
    use crate::api::IngestError;
    use crate::event::EventEnvelope;
    use crate::redis::MockRedisClient;

    fn envelope() -> EventEnvelope {
        EventEnvelope {
            api_key: String::from("sync_abc"),
            event_id: String::from("evt1"),
            payload: json!({"x": 1}),
            received_at: String::from("2024-06-01T00:00:00Z"),
        }
    }

    #[tokio::test]
    async fn pushes_the_encoded_envelope() {
        let redis = MockRedisClient::new();
        let sink = RedisQueueSink::new(Arc::new(redis.clone()), DEFAULT_QUEUE_KEY.to_string());

        sink.send(envelope()).await.unwrap();

        let items = redis.list_items(DEFAULT_QUEUE_KEY);
        assert_eq!(items.len(), 1);

        let stored: EventEnvelope = serde_json::from_str(&items[0]).unwrap();
        assert_eq!(stored, envelope());
    }

    #[tokio::test]
    async fn write_failure_is_store_unavailable() {
        let redis = MockRedisClient::new();
        redis.fail_rpush(true);
        let sink = RedisQueueSink::new(Arc::new(redis.clone()), DEFAULT_QUEUE_KEY.to_string());

        match sink.send(envelope()).await {
            Err(IngestError::StoreUnavailable) => (),
            other => panic!("expected StoreUnavailable, got {:?}", other),
        }
        assert_eq!(redis.list_len(DEFAULT_QUEUE_KEY), 0);
    }
}
