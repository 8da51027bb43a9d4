use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "false")]
    pub print_sink: bool,

    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    pub redis_url: String,

    #[envconfig(default = "1000")]
    pub redis_timeout_ms: u64,

    #[envconfig(default = "events:queue")]
    pub queue_name: String,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    // The remaining parameters are not read by the ingestion pipeline: they
    // are the contract of the batch aggregator that drains the queue into
    // the analytics store, kept here so both processes deploy from one
    // environment.
    #[envconfig(default = "60")]
    pub aggregator_window_secs: u64,

    #[envconfig(default = "1000")]
    pub aggregator_batch_size: usize,

    pub clickhouse_url: Option<String>,
}
