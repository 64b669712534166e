// tests/common/mod.rs
// Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use pathcache::store::{KeyTtl, KeyValueStore, MemoryStore, StoreError, StoreResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `MemoryStore` wrapper that can be switched into failure and slow modes
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_all: AtomicBool,
    fail_deletes: AtomicBool,
    delay_ms: AtomicU64,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn set_down(&self, down: bool) {
        self.fail_all.store(down, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn gate(&self) -> StoreResult<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn gate_delete(&self) -> StoreResult<()> {
        self.gate().await?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("delete rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.gate().await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        self.gate().await?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.gate_delete().await?;
        self.inner.delete(key).await
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<u64> {
        self.gate_delete().await?;
        self.inner.delete_many(keys).await
    }

    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>> {
        self.gate().await?;
        self.inner.scan(pattern).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        self.gate().await?;
        self.inner.ttl(key).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.gate().await?;
        self.inner.exists(key).await
    }

    async fn flush(&self) -> StoreResult<u64> {
        self.gate_delete().await?;
        self.inner.flush().await
    }

    async fn key_count(&self) -> StoreResult<u64> {
        self.gate().await?;
        self.inner.key_count().await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.gate().await
    }

    fn backend_name(&self) -> &'static str {
        "faulty-memory"
    }
}
