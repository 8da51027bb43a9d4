use std::future::ready;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use health::HealthRegistry;
use tower_http::trace::TraceLayer;

use crate::dedup::DedupGate;
use crate::prometheus::{setup_metrics_recorder, track_metrics};
use crate::redis::Client;
use crate::{sink, submit, time::TimeSource};

#[derive(Clone)]
pub struct State {
    pub sink: Arc<dyn sink::EventSink + Send + Sync>,
    pub timesource: Arc<dyn TimeSource + Send + Sync>,
    pub dedup: DedupGate,
}

async fn index() -> &'static str {
    "ingest"
}

pub fn router<
    TZ: TimeSource + Send + Sync + 'static,
    S: sink::EventSink + Send + Sync + 'static,
>(
    timesource: TZ,
    sink: S,
    redis: Arc<dyn Client + Send + Sync>,
    liveness: HealthRegistry,
    metrics: bool,
) -> Router {
    let state = State {
        sink: Arc::new(sink),
        timesource: Arc::new(timesource),
        dedup: DedupGate::new(redis),
    };

    let router = Router::new()
        .route("/", get(index))
        .route("/event/add", post(submit::event))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Don't install metrics unless asked to
    // Installing a global recorder when ingest is used as a library (during tests etc)
    // does not work well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();

        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
