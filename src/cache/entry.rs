//! Stored value envelope
//!
//! Values are written as `{"value": .., "cached_at": millis, "ttl_secs": n}`
//! so sweeps can tell how old an entry is without knowing its type.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    pub value: T,
    /// Unix epoch milliseconds at insertion
    pub cached_at: i64,
    pub ttl_secs: u64,
}

impl<T> CacheEnvelope<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: chrono::Utc::now().timestamp_millis(),
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Time since insertion; zero if the clock went backwards
    pub fn age_at(&self, now_millis: i64) -> Duration {
        Duration::from_millis(now_millis.saturating_sub(self.cached_at).max(0) as u64)
    }
}

/// Envelope with the payload skipped, for metadata-only inspection
pub type EnvelopeHeader = CacheEnvelope<IgnoredAny>;

pub fn decode_header(raw: &str) -> Option<EnvelopeHeader> {
    serde_json::from_str(raw).ok()
}
