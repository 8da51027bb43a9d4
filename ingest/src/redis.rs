use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;

// A simple redis wrapper exposing only the commands the ingestion pipeline
// uses. Going through a trait lets tests inject failures and control the
// clock without a live server.

pub const DEFAULT_REDIS_TIMEOUT_MILLISECS: u64 = 1000;

#[derive(Error, Debug)]
pub enum CustomRedisError {
    #[error("timed out talking to redis")]
    Timeout(#[from] tokio::time::error::Elapsed),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait Client {
    async fn ping(&self) -> Result<(), CustomRedisError>;

    /// Atomic `SET k v EX seconds NX`. Returns true if the key was newly
    /// set, false if it already existed. This single round trip is the
    /// idempotency gate: a separate get-then-set would race under
    /// concurrent resubmission.
    async fn set_nx_ex(&self, k: String, v: String, seconds: u64)
        -> Result<bool, CustomRedisError>;

    /// Append to a list, returning the new list length.
    async fn rpush(&self, k: String, v: String) -> Result<u64, CustomRedisError>;
}

pub struct RedisClient {
    client: redis::Client,
    timeout: Duration,
}

impl RedisClient {
    pub fn new(addr: String) -> anyhow::Result<RedisClient> {
        Self::with_timeout(addr, Duration::from_millis(DEFAULT_REDIS_TIMEOUT_MILLISECS))
    }

    pub fn with_timeout(addr: String, timeout: Duration) -> anyhow::Result<RedisClient> {
        let client = redis::Client::open(addr)?;

        Ok(RedisClient { client, timeout })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn ping(&self) -> Result<(), CustomRedisError> {
        let fut = async {
            let mut conn = self.client.get_async_connection().await?;
            let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, CustomRedisError>(())
        };

        timeout(self.timeout, fut).await?
    }

    async fn set_nx_ex(
        &self,
        k: String,
        v: String,
        seconds: u64,
    ) -> Result<bool, CustomRedisError> {
        let fut = async {
            let mut conn = self.client.get_async_connection().await?;
            let set: Option<String> = redis::cmd("SET")
                .arg(&k)
                .arg(&v)
                .arg("EX")
                .arg(seconds)
                .arg("NX")
                .query_async(&mut conn)
                .await?;
            Ok::<_, CustomRedisError>(set.is_some())
        };

        timeout(self.timeout, fut).await?
    }

    async fn rpush(&self, k: String, v: String) -> Result<u64, CustomRedisError> {
        let fut = async {
            let mut conn = self.client.get_async_connection().await?;
            let length: u64 = redis::cmd("RPUSH")
                .arg(&k)
                .arg(&v)
                .query_async(&mut conn)
                .await?;
            Ok::<_, CustomRedisError>(length)
        };

        timeout(self.timeout, fut).await?
    }
}

#[derive(Default)]
struct MockState {
    /// Logical clock in seconds, advanced explicitly by tests.
    now: u64,
    /// value + optional expiry, in logical seconds
    strings: HashMap<String, (String, Option<u64>)>,
    lists: HashMap<String, Vec<String>>,
}

impl MockState {
    fn purge_expired(&mut self) {
        let now = self.now;
        self.strings
            .retain(|_, (_, expires_at)| expires_at.map_or(true, |at| at > now));
    }
}

/// In-memory stand-in for redis. Check-and-set is atomic under the inner
/// mutex, so concurrency tests exercise the same at-most-once guarantee the
/// real store provides.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    state: Arc<Mutex<MockState>>,
    fail_set_nx_ex: Arc<AtomicBool>,
    fail_rpush: Arc<AtomicBool>,
    commands_seen: Arc<AtomicU64>,
}

impl MockRedisClient {
    pub fn new() -> MockRedisClient {
        Self::default()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn fail_set_nx_ex(&self, fail: bool) {
        self.fail_set_nx_ex.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rpush(&self, fail: bool) {
        self.fail_rpush.store(fail, Ordering::SeqCst);
    }

    /// Move the logical clock forward so TTLs can elapse in tests.
    pub fn advance_clock(&self, seconds: u64) {
        let mut state = self.lock_state();
        state.now += seconds;
        state.purge_expired();
    }

    pub fn key_exists(&self, k: &str) -> bool {
        let mut state = self.lock_state();
        state.purge_expired();
        state.strings.contains_key(k)
    }

    pub fn list_items(&self, k: &str) -> Vec<String> {
        self.lock_state().lists.get(k).cloned().unwrap_or_default()
    }

    pub fn list_len(&self, k: &str) -> usize {
        self.lock_state().lists.get(k).map_or(0, Vec::len)
    }

    /// Total commands issued, to assert that invalid requests never reach
    /// the store.
    pub fn commands_seen(&self) -> u64 {
        self.commands_seen.load(Ordering::SeqCst)
    }

    fn injected_failure() -> CustomRedisError {
        CustomRedisError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "injected failure",
        )))
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn ping(&self) -> Result<(), CustomRedisError> {
        self.commands_seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_nx_ex(
        &self,
        k: String,
        v: String,
        seconds: u64,
    ) -> Result<bool, CustomRedisError> {
        self.commands_seen.fetch_add(1, Ordering::SeqCst);
        if self.fail_set_nx_ex.load(Ordering::SeqCst) {
            return Err(Self::injected_failure());
        }

        let mut state = self.lock_state();
        state.purge_expired();
        if state.strings.contains_key(&k) {
            return Ok(false);
        }
        let expires_at = state.now + seconds;
        state.strings.insert(k, (v, Some(expires_at)));
        Ok(true)
    }

    async fn rpush(&self, k: String, v: String) -> Result<u64, CustomRedisError> {
        self.commands_seen.fetch_add(1, Ordering::SeqCst);
        if self.fail_rpush.load(Ordering::SeqCst) {
            return Err(Self::injected_failure());
        }

        let mut state = self.lock_state();
        let list = state.lists.entry(k).or_default();
        list.push(v);
        Ok(list.len() as u64)
    }
}
