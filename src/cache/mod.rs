// src/cache/mod.rs - Typed cache over a key-value store

pub mod entry;
pub mod keys;
pub mod metrics;
pub mod service;

pub use entry::CacheEnvelope;
pub use metrics::{MetricsCollector, Outcome, PerformanceMetrics};
pub use service::CacheService;
