//! Read-through / write-through cache with metrics
//!
//! Store failures never reach the caller: they are logged, counted as
//! errors, and surface as `None` / `false` so the caller falls back to the
//! source of truth as if the cache were empty.

use super::entry::CacheEnvelope;
use super::metrics::{MetricsCollector, Outcome, PerformanceMetrics};
use crate::monitoring::metrics as prom;
use crate::store::{KeyValueStore, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn KeyValueStore>,
    default_ttl: Duration,
    metrics: Arc<MetricsCollector>,
}

impl CacheService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_default_ttl(store, DEFAULT_TTL)
    }

    pub fn with_default_ttl(store: Arc<dyn KeyValueStore>, default_ttl: Duration) -> Self {
        Self {
            store,
            default_ttl,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Count one store round-trip in both the local counters and Prometheus
    pub(crate) fn record(&self, op: &str, outcome: Outcome, latency: Duration) {
        self.metrics.record(outcome, latency);
        prom::observe_store_latency_ms(op, latency.as_secs_f64() * 1000.0);
        match outcome {
            Outcome::Hit => prom::CACHE_HITS_TOTAL.inc(),
            Outcome::Miss => prom::CACHE_MISSES_TOTAL.inc(),
            Outcome::Error => prom::CACHE_ERRORS_TOTAL.inc(),
            _ => {}
        }
    }

    /// Run a store call, timing it and recording an error on failure.
    /// Success outcomes are left to the caller.
    pub(crate) async fn timed<T, Fut>(&self, op: &str, fut: Fut) -> (StoreResult<T>, Duration)
    where
        Fut: Future<Output = StoreResult<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed();
        if let Err(e) = &result {
            warn!(op, error = %e, "Cache store operation failed");
            self.record(op, Outcome::Error, elapsed);
        }
        (result, elapsed)
    }

    /// Time a maintenance call for Prometheus only. Background sweeps go
    /// through here so they never move the hit, error or latency figures
    /// that health and alerting read.
    pub(crate) async fn untracked<T, Fut>(&self, op: &str, fut: Fut) -> StoreResult<T>
    where
        Fut: Future<Output = StoreResult<T>>,
    {
        let start = Instant::now();
        let result = fut.await;
        prom::observe_store_latency_ms(op, start.elapsed().as_secs_f64() * 1000.0);
        if let Err(e) = &result {
            warn!(op, error = %e, "Cache maintenance operation failed");
        }
        result
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let (result, elapsed) = self.timed("get", self.store.get(key)).await;
        match result {
            Ok(Some(raw)) => match serde_json::from_str::<CacheEnvelope<T>>(&raw) {
                Ok(envelope) => {
                    self.record("get", Outcome::Hit, elapsed);
                    debug!(key, "cache hit");
                    Some(envelope.value)
                }
                Err(e) => {
                    warn!(key, error = %e, "Failed to decode cached value");
                    self.record("get", Outcome::Error, elapsed);
                    None
                }
            },
            Ok(None) => {
                self.record("get", Outcome::Miss, elapsed);
                debug!(key, "cache miss");
                None
            }
            Err(_) => None,
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let raw = match serde_json::to_string(&CacheEnvelope::new(value, ttl)) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode value for cache");
                self.metrics.record_error();
                prom::CACHE_ERRORS_TOTAL.inc();
                return false;
            }
        };

        let (result, elapsed) = self.timed("set", self.store.set(key, &raw, Some(ttl))).await;
        match result {
            Ok(()) => {
                self.record("set", Outcome::Set, elapsed);
                true
            }
            Err(_) => false,
        }
    }

    /// Return the cached value, or run `producer` on a miss and store its
    /// result. There is no single-flight: concurrent misses each run their
    /// producer and the last write wins.
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, ttl: Option<Duration>, producer: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let result: Result<T, Infallible> = self
            .try_get_or_set(key, ttl, move || async move { Ok(producer().await) })
            .await;
        result.unwrap_or_else(|never| match never {})
    }

    /// Like `get_or_set` for fallible producers. A producer error is returned
    /// as-is and nothing is cached.
    pub async fn try_get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }
        let value = producer().await?;
        if !self.set(key, &value, ttl).await {
            debug!(key, "get_or_set could not populate cache; serving produced value");
        }
        Ok(value)
    }

    /// True iff the key existed and was removed
    pub async fn delete(&self, key: &str) -> bool {
        let (result, elapsed) = self.timed("delete", self.store.delete(key)).await;
        match result {
            Ok(true) => {
                self.record("delete", Outcome::Delete, elapsed);
                true
            }
            Ok(false) => {
                self.record("delete", Outcome::Neutral, elapsed);
                false
            }
            Err(_) => false,
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        let (result, elapsed) = self.timed("exists", self.store.exists(key)).await;
        match result {
            Ok(found) => {
                self.record("exists", Outcome::Neutral, elapsed);
                found
            }
            Err(_) => false,
        }
    }

    /// Remove every key in the namespace. Operational use only.
    pub async fn flush_all(&self) -> bool {
        let (result, elapsed) = self.timed("flush", self.store.flush()).await;
        match result {
            Ok(removed) => {
                self.record("flush", Outcome::Neutral, elapsed);
                tracing::info!(removed, backend = self.store.backend_name(), "Cache flushed");
                true
            }
            Err(_) => false,
        }
    }

    pub async fn key_count(&self) -> Option<u64> {
        let (result, elapsed) = self.timed("key_count", self.store.key_count()).await;
        let count = result.ok()?;
        self.record("key_count", Outcome::Neutral, elapsed);
        Some(count)
    }

    pub async fn ping(&self) -> bool {
        let (result, elapsed) = self.timed("ping", self.store.ping()).await;
        if result.is_ok() {
            self.record("ping", Outcome::Neutral, elapsed);
        }
        result.is_ok()
    }

    pub fn get_metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
        tracing::info!("Cache metrics reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PathDetail {
        title: String,
        modules: Vec<String>,
    }

    fn cache() -> (CacheService, MemoryStore) {
        let store = MemoryStore::new();
        (CacheService::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let (cache, _) = cache();
        let value = PathDetail {
            title: "Rust basics".to_string(),
            modules: vec!["ownership".to_string()],
        };
        assert!(cache.set("path:1:detail", &value, Some(Duration::from_secs(60))).await);
        assert_eq!(cache.get::<PathDetail>("path:1:detail").await, Some(value));
    }

    #[tokio::test]
    async fn test_miss_increments_miss_counter_once() {
        let (cache, _) = cache();
        assert_eq!(cache.get::<String>("path:404:detail").await, None);
        let m = cache.get_metrics();
        assert_eq!(m.misses, 1);
        assert_eq!(m.hits, 0);
        assert_eq!(m.errors, 0);
    }

    #[tokio::test]
    async fn test_undecodable_value_counts_as_error() {
        let (cache, store) = cache();
        store.set("path:1:detail", "{garbage", None).await.unwrap();
        assert_eq!(cache.get::<PathDetail>("path:1:detail").await, None);
        let m = cache.get_metrics();
        assert_eq!(m.errors, 1);
        assert_eq!(m.hits, 0);
    }

    #[tokio::test]
    async fn test_default_ttl_applies() {
        let store = MemoryStore::new();
        let cache =
            CacheService::with_default_ttl(Arc::new(store.clone()), Duration::from_secs(42));
        cache.set("k", &1u32, None).await;
        match store.ttl("k").await.unwrap() {
            crate::store::KeyTtl::Expires(left) => assert!(left <= Duration::from_secs(42)),
            other => panic!("expected expiring key, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_or_set_runs_producer_once_per_miss() {
        let (cache, _) = cache();
        let calls = AtomicUsize::new(0);

        let first: u32 = cache
            .get_or_set("module:1:detail", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                7
            })
            .await;
        let second: u32 = cache
            .get_or_set("module:1:detail", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                8
            })
            .await;

        assert_eq!(first, 7);
        assert_eq!(second, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_try_get_or_set_does_not_cache_errors() {
        let (cache, store) = cache();
        let result: Result<u32, String> = cache
            .try_get_or_set("challenge:1:detail", None, || async {
                Err("db down".to_string())
            })
            .await;
        assert_eq!(result, Err("db down".to_string()));
        assert!(!store.exists("challenge:1:detail").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_not_an_error() {
        let (cache, _) = cache();
        assert!(!cache.delete("nope").await);
        assert_eq!(cache.get_metrics().errors, 0);

        cache.set("yes", &1u8, None).await;
        assert!(cache.delete("yes").await);
        assert_eq!(cache.get_metrics().deletes, 1);
    }

    #[tokio::test]
    async fn test_flush_all_and_reset_metrics() {
        let (cache, store) = cache();
        cache.set("a", &1u8, None).await;
        cache.set("b", &2u8, None).await;
        assert!(cache.flush_all().await);
        assert!(store.is_empty());

        cache.get::<u8>("a").await;
        cache.reset_metrics();
        assert_eq!(cache.get_metrics(), PerformanceMetrics::default());

        cache.get::<u8>("a").await;
        assert_eq!(cache.get_metrics().misses, 1);
    }
}
