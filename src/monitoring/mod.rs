//! Monitoring for the cache layer
//!
//! Provides:
//! - Structured logging with tracing
//! - Prometheus metrics collection
//! - Cache health evaluation and threshold alerts
//! - Request tracing middleware

pub mod alerting_hooks;
pub mod alerts;
pub mod config;
pub mod health;
pub mod metrics;
pub mod service;
pub mod trace_middleware;
pub mod tracing_config;

pub use alerting_hooks::AlertingHooksConfig;
pub use alerts::{Alert, AlertKind, AlertLog, AlertSeverity, AlertThresholds};
pub use config::MonitoringConfig;
pub use health::{HealthReport, HealthState};
pub use metrics::{export_prometheus, REGISTRY};
pub use service::{CacheMonitoringService, MetricsSummary, PerformanceReport};
pub use trace_middleware::TraceMiddleware;
