// src/store/redis_store.rs - Redis-backed key-value store

use super::{KeyTtl, KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    pub url: String,
    /// Prepended to every key; scans and flushes stay inside it
    pub key_prefix: String,
    pub connect_timeout: Duration,
    /// Reconnect attempts made by the connection manager before an op fails
    pub max_retries: usize,
    /// Upper bound on the exponential reconnect delay, in milliseconds
    pub max_delay_ms: u64,
    /// Quiet period after a failed connect; calls fail fast until it passes
    pub reconnect_backoff: Duration,
    pub scan_count: usize,
    pub delete_batch: usize,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/".to_string(),
            key_prefix: String::new(),
            connect_timeout: Duration::from_secs(5),
            max_retries: 6,
            max_delay_ms: 2000,
            reconnect_backoff: Duration::from_secs(2),
            scan_count: 200,
            delete_batch: 500,
        }
    }
}

#[derive(Default)]
struct ConnState {
    manager: Option<ConnectionManager>,
    /// A connect attempt is in flight
    connecting: bool,
    last_failure: Option<Instant>,
}

/// Clears `connecting` even if the attempt is dropped mid-await
struct ConnectAttempt<'a> {
    state: &'a Mutex<ConnState>,
    done: bool,
}

impl ConnectAttempt<'_> {
    fn finish(mut self, result: &StoreResult<ConnectionManager>) {
        self.done = true;
        let mut state = self.state.lock();
        state.connecting = false;
        match result {
            Ok(manager) => {
                state.manager = Some(manager.clone());
                state.last_failure = None;
            }
            Err(_) => state.last_failure = Some(Instant::now()),
        }
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if !self.done {
            let mut state = self.state.lock();
            state.connecting = false;
            state.last_failure = Some(Instant::now());
        }
    }
}

/// Redis store shared by every cache component in the process.
///
/// The connection is established on `connect()` or lazily on first use, and
/// dropped by `disconnect()`. Only one connect runs at a time and the lock is
/// never held across it: concurrent callers, and every caller inside the
/// backoff window after a failed attempt, get `NotConnected` immediately.
/// Once connected, `ConnectionManager` handles reconnects itself.
#[derive(Clone)]
pub struct RedisStore {
    config: RedisStoreConfig,
    state: Arc<Mutex<ConnState>>,
}

impl RedisStore {
    pub fn new(config: RedisStoreConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ConnState::default())),
        }
    }

    pub fn config(&self) -> &RedisStoreConfig {
        &self.config
    }

    /// Open the connection eagerly, ignoring any backoff window
    pub async fn connect(&self) -> StoreResult<()> {
        self.establish(false).await.map(|_| ())
    }

    pub async fn disconnect(&self) {
        let mut state = self.state.lock();
        state.last_failure = None;
        if state.manager.take().is_some() {
            info!(url = %self.config.url, "Redis store disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().manager.is_some()
    }

    async fn open(&self) -> StoreResult<ConnectionManager> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(self.config.max_retries)
            .set_max_delay(self.config.max_delay_ms);

        match tokio::time::timeout(
            self.config.connect_timeout,
            ConnectionManager::new_with_config(client, manager_config),
        )
        .await
        {
            Ok(Ok(manager)) => {
                info!(
                    url = %self.config.url,
                    prefix = %self.config.key_prefix,
                    "Redis store connected"
                );
                Ok(manager)
            }
            Ok(Err(e)) => {
                error!(url = %self.config.url, error = %e, "Failed to create Redis connection manager");
                Err(e.into())
            }
            Err(_) => {
                error!(url = %self.config.url, timeout = ?self.config.connect_timeout, "Redis connect timed out");
                Err(StoreError::Timeout(self.config.connect_timeout))
            }
        }
    }

    async fn establish(&self, respect_backoff: bool) -> StoreResult<ConnectionManager> {
        let attempt = {
            let mut state = self.state.lock();
            if let Some(manager) = state.manager.as_ref() {
                return Ok(manager.clone());
            }
            if state.connecting {
                return Err(StoreError::NotConnected);
            }
            if respect_backoff {
                if let Some(failed_at) = state.last_failure {
                    if failed_at.elapsed() < self.config.reconnect_backoff {
                        return Err(StoreError::NotConnected);
                    }
                }
            }
            state.connecting = true;
            ConnectAttempt {
                state: &self.state,
                done: false,
            }
        };

        let result = self.open().await;
        attempt.finish(&result);
        result
    }

    async fn conn(&self) -> StoreResult<ConnectionManager> {
        self.establish(true).await
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn strip_namespace(&self, key: String) -> String {
        match key.strip_prefix(self.config.key_prefix.as_str()) {
            Some(stripped) => stripped.to_string(),
            None => key,
        }
    }

    /// Cursor-driven SCAN over raw (already namespaced) pattern
    async fn scan_raw(&self, raw_pattern: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(raw_pattern)
                .arg("COUNT")
                .arg(self.config.scan_count)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn delete_raw(&self, raw_keys: Vec<String>) -> StoreResult<u64> {
        if raw_keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let mut removed: u64 = 0;
        for chunk in raw_keys.chunks(self.config.delete_batch.max(1)) {
            let n: u64 = conn.del(chunk.to_vec()).await?;
            removed += n;
        }
        Ok(removed)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(self.namespaced(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let key = self.namespaced(key);
        match ttl {
            Some(ttl) => {
                let millis = (ttl.as_millis() as u64).max(1);
                conn.pset_ex::<_, _, ()>(key, value, millis).await?;
            }
            None => {
                conn.set::<_, _, ()>(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let removed: u64 = conn.del(self.namespaced(key)).await?;
        Ok(removed > 0)
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<u64> {
        let raw = keys.iter().map(|k| self.namespaced(k)).collect();
        self.delete_raw(raw).await
    }

    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let raw = self.scan_raw(&self.namespaced(pattern)).await?;
        Ok(raw.into_iter().map(|k| self.strip_namespace(k)).collect())
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let mut conn = self.conn().await?;
        let millis: i64 = redis::cmd("PTTL")
            .arg(self.namespaced(key))
            .query_async(&mut conn)
            .await?;
        Ok(match millis {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            ms => KeyTtl::Expires(Duration::from_millis(ms.max(0) as u64)),
        })
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let exists: bool = conn.exists(self.namespaced(key)).await?;
        Ok(exists)
    }

    async fn flush(&self) -> StoreResult<u64> {
        let raw = self.scan_raw(&self.namespaced("*")).await?;
        let removed = self.delete_raw(raw).await?;
        debug!(prefix = %self.config.key_prefix, removed, "Redis namespace flushed");
        Ok(removed)
    }

    async fn key_count(&self) -> StoreResult<u64> {
        if self.config.key_prefix.is_empty() {
            let mut conn = self.conn().await?;
            let count: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
            return Ok(count);
        }
        Ok(self.scan_raw(&self.namespaced("*")).await?.len() as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("unexpected PING reply: {}", reply)))
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> RedisStore {
        RedisStore::new(RedisStoreConfig {
            key_prefix: "pathcache-test:".to_string(),
            ..RedisStoreConfig::default()
        })
    }

    #[test]
    fn test_namespacing() {
        let store = test_store();
        assert_eq!(store.namespaced("path:1:detail"), "pathcache-test:path:1:detail");
        assert_eq!(
            store.strip_namespace("pathcache-test:path:1:detail".to_string()),
            "path:1:detail"
        );
        assert_eq!(store.strip_namespace("other".to_string()), "other");
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_connection() {
        let store = test_store();
        store.connect().await.unwrap();
        assert!(store.is_connected());
        store.ping().await.unwrap();
        store.disconnect().await;
        assert!(!store.is_connected());
    }

    #[tokio::test]
    async fn test_unreachable_redis_fails_fast() {
        let store = RedisStore::new(RedisStoreConfig {
            url: "redis://127.0.0.1:1/".to_string(),
            connect_timeout: Duration::from_millis(500),
            max_retries: 0,
            reconnect_backoff: Duration::from_secs(30),
            ..RedisStoreConfig::default()
        });

        let started = Instant::now();
        let (a, b, c, d) = tokio::join!(
            store.get("k1"),
            store.get("k2"),
            store.get("k3"),
            store.get("k4")
        );
        // One caller pays for the connect; the rest do not queue behind it
        assert!(started.elapsed() < Duration::from_millis(900));
        let results = [a, b, c, d];
        assert!(results.iter().all(|r| r.is_err()));
        assert!(
            results
                .iter()
                .filter(|r| matches!(r, Err(StoreError::NotConnected)))
                .count()
                >= 3
        );

        // Inside the backoff window nobody reconnects
        let started = Instant::now();
        assert!(matches!(store.get("k5").await, Err(StoreError::NotConnected)));
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(!store.is_connected());
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_sub_second_ttl() {
        let store = test_store();
        store
            .set("short", "1", Some(Duration::from_millis(1500)))
            .await
            .unwrap();
        match store.ttl("short").await.unwrap() {
            KeyTtl::Expires(left) => assert!(left > Duration::from_millis(1000)),
            other => panic!("unexpected ttl {:?}", other),
        }
        store.flush().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_scan_and_delete() {
        let store = test_store();
        store.flush().await.unwrap();
        for key in ["user:42:a", "user:42:b", "user:43:a"] {
            store.set(key, "1", Some(Duration::from_secs(60))).await.unwrap();
        }

        let keys = store.scan("user:42:*").await.unwrap();
        assert_eq!(keys, vec!["user:42:a".to_string(), "user:42:b".to_string()]);
        assert_eq!(store.delete_many(&keys).await.unwrap(), 2);
        assert!(store.exists("user:43:a").await.unwrap());

        store.flush().await.unwrap();
    }
}
