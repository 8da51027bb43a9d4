pub mod api;
pub mod config;
pub mod dedup;
pub mod event;
pub mod prometheus;
pub mod redis;
pub mod router;
pub mod server;
pub mod sink;
pub mod submit;
pub mod time;
pub mod token;
