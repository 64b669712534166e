// src/store/mod.rs - Key-value store adapters
//
// The cache layer only talks to `KeyValueStore`. Redis is the production
// backend; `MemoryStore` backs tests and single-process deployments.

pub mod memory_store;
pub mod redis_store;

pub use memory_store::MemoryStore;
pub use redis_store::{RedisStore, RedisStoreConfig};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store not connected")]
    NotConnected,

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Remaining lifetime of a stored key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

/// Primitive operations over a networked key-value store.
///
/// Single-key operations are atomic. Nothing spanning several keys is.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`. `None` means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Returns true iff the key existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Returns the number of keys actually removed.
    async fn delete_many(&self, keys: &[String]) -> StoreResult<u64>;

    /// All keys matching a glob pattern (`*`, `?`, `[...]`).
    async fn scan(&self, pattern: &str) -> StoreResult<Vec<String>>;

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Remove every key in the store's namespace, returning how many went.
    async fn flush(&self) -> StoreResult<u64>;

    async fn key_count(&self) -> StoreResult<u64>;

    async fn ping(&self) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// True if the key contains glob metacharacters and must go through `scan`
pub fn is_pattern(key: &str) -> bool {
    key.contains(['*', '?', '['])
}

/// Reject globs that cannot be matched, e.g. an unterminated `[`
pub fn validate_pattern(pattern: &str) -> StoreResult<()> {
    memory_store::glob_to_regex(pattern).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pattern() {
        assert!(validate_pattern("user:42:*").is_ok());
        assert!(validate_pattern("path:[12]:detail").is_ok());
        assert!(matches!(
            validate_pattern("user:[12"),
            Err(StoreError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_is_pattern() {
        assert!(is_pattern("path:1:*"));
        assert!(is_pattern("user:?:a"));
        assert!(is_pattern("user:[12]:a"));
        assert!(!is_pattern("path:1:detail"));
    }
}
