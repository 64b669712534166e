//! Cumulative cache counters
//!
//! Counters live behind one mutex so `reset` and every increment are
//! serialized: a reset never loses an increment that raced with it, and a
//! snapshot never sees half of an update.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    /// Every store round-trip, successful or not
    pub operations: u64,
    pub total_latency_us: u64,
}

impl PerformanceMetrics {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            self.errors as f64 / self.operations as f64
        }
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            self.total_latency_us as f64 / self.operations as f64 / 1000.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss,
    Set,
    Delete,
    /// Round-trip that changed nothing counted above (a delete of a missing key, a scan)
    Neutral,
    Error,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<PerformanceMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: Outcome, latency: Duration) {
        let mut m = self.inner.lock();
        m.operations += 1;
        m.total_latency_us += latency.as_micros() as u64;
        match outcome {
            Outcome::Hit => m.hits += 1,
            Outcome::Miss => m.misses += 1,
            Outcome::Set => m.sets += 1,
            Outcome::Delete => m.deletes += 1,
            Outcome::Neutral => {}
            Outcome::Error => m.errors += 1,
        }
    }

    /// Errors that happen outside a store round-trip, e.g. a failed decode
    pub fn record_error(&self) {
        self.inner.lock().errors += 1;
    }

    pub fn snapshot(&self) -> PerformanceMetrics {
        *self.inner.lock()
    }

    pub fn reset(&self) {
        *self.inner.lock() = PerformanceMetrics::default();
    }
}
