use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use health::{HealthHandle, HealthRegistry};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::redis::{Client, RedisClient};
use crate::sink::{PrintSink, RedisQueueSink};
use crate::{router, time::SystemTime};

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let liveness = HealthRegistry::new();

    let redis_client: Arc<dyn Client + Send + Sync> = Arc::new(
        RedisClient::with_timeout(
            config.redis_url.clone(),
            Duration::from_millis(config.redis_timeout_ms),
        )
        .expect("failed to create redis client"),
    );

    let redis_liveness = liveness.register(String::from("redis"), time::Duration::seconds(60));
    tokio::spawn(report_redis_liveness(redis_client.clone(), redis_liveness));

    let app = if config.print_sink {
        router::router(
            SystemTime {},
            PrintSink {},
            redis_client,
            liveness,
            config.export_prometheus,
        )
    } else {
        let sink = RedisQueueSink::new(redis_client.clone(), config.queue_name.clone());
        router::router(
            SystemTime {},
            sink,
            redis_client,
            liveness,
            config.export_prometheus,
        )
    };

    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .unwrap()
}

/// The store is the only dependency of the hot path, so its reachability is
/// the process' liveness.
async fn report_redis_liveness(redis: Arc<dyn Client + Send + Sync>, handle: HealthHandle) {
    let mut interval = tokio::time::interval(Duration::from_secs(15));
    loop {
        interval.tick().await;
        match redis.ping().await {
            Ok(()) => handle.report_healthy(),
            Err(err) => {
                tracing::warn!("redis ping failed: {}", err);
                handle.report_unhealthy();
            }
        }
    }
}
