use std::sync::Arc;

use metrics::counter;

use crate::api::IngestError;
use crate::redis::Client;

pub const DEDUP_KEY_PREFIX: &str = "event_queued:";

/// Markers expire after this window; a resubmission past it is treated as
/// new. This is a deliberate bound, not permanent dedup.
pub const DEDUP_RETENTION: time::Duration = time::Duration::hours(24);

#[derive(Debug, PartialEq, Eq)]
pub enum DedupDecision {
    /// Marker newly set, the caller must enqueue the envelope.
    FirstSeen,
    /// A submission with this event_id was already accepted within the
    /// retention window.
    AlreadyQueued,
}

/// Lock-free idempotency gate backed by the store's atomic
/// conditional-set-with-expiry. Instances share no in-process state, all
/// coordination goes through redis.
#[derive(Clone)]
pub struct DedupGate {
    redis: Arc<dyn Client + Send + Sync>,
}

impl DedupGate {
    pub fn new(redis: Arc<dyn Client + Send + Sync>) -> DedupGate {
        DedupGate { redis }
    }

    pub async fn check_and_mark(&self, event_id: &str) -> Result<DedupDecision, IngestError> {
        let key = format!("{DEDUP_KEY_PREFIX}{event_id}");
        let newly_set = self
            .redis
            .set_nx_ex(
                key,
                String::from("1"),
                DEDUP_RETENTION.whole_seconds() as u64,
            )
            .await
            .map_err(|e| {
                tracing::error!(event_id = event_id, "failed to set dedup marker: {}", e);
                counter!("ingest_dedup_store_errors_total").increment(1);
                IngestError::StoreUnavailable
            })?;

        if newly_set {
            Ok(DedupDecision::FirstSeen)
        } else {
            Ok(DedupDecision::AlreadyQueued)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::api::IngestError;
    use crate::dedup::{DedupDecision, DedupGate, DEDUP_KEY_PREFIX, DEDUP_RETENTION};
    use crate::redis::MockRedisClient;

    #[tokio::test]
    async fn first_submission_sets_the_marker() {
        let redis = MockRedisClient::new();
        let gate = DedupGate::new(Arc::new(redis.clone()));

        let decision = gate.check_and_mark("evt1").await.unwrap();

        assert_eq!(decision, DedupDecision::FirstSeen);
        assert!(redis.key_exists(&format!("{DEDUP_KEY_PREFIX}evt1")));
    }

    #[tokio::test]
    async fn resubmission_within_the_window_is_a_duplicate() {
        let gate = DedupGate::new(Arc::new(MockRedisClient::new()));

        assert_eq!(
            gate.check_and_mark("evt1").await.unwrap(),
            DedupDecision::FirstSeen
        );
        assert_eq!(
            gate.check_and_mark("evt1").await.unwrap(),
            DedupDecision::AlreadyQueued
        );
    }

    #[tokio::test]
    async fn marker_expiry_makes_the_event_new_again() {
        let redis = MockRedisClient::new();
        let gate = DedupGate::new(Arc::new(redis.clone()));

        gate.check_and_mark("evt1").await.unwrap();
        redis.advance_clock(DEDUP_RETENTION.whole_seconds() as u64 + 1);

        assert_eq!(
            gate.check_and_mark("evt1").await.unwrap(),
            DedupDecision::FirstSeen
        );
    }

    #[tokio::test]
    async fn store_failure_is_surfaced_not_swallowed() {
        let redis = MockRedisClient::new();
        redis.fail_set_nx_ex(true);
        let gate = DedupGate::new(Arc::new(redis));

        match gate.check_and_mark("evt1").await {
            Err(IngestError::StoreUnavailable) => (),
            other => panic!("expected StoreUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn concurrent_submissions_see_exactly_one_first() {
        let gate = DedupGate::new(Arc::new(MockRedisClient::new()));

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let gate = gate.clone();
            set.spawn(async move { gate.check_and_mark("evt1").await.unwrap() });
        }

        let mut first_seen = 0;
        while let Some(decision) = set.join_next().await {
            if decision.unwrap() == DedupDecision::FirstSeen {
                first_seen += 1;
            }
        }

        assert_eq!(first_seen, 1);
    }
}
