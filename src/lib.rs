pub mod api;
pub mod cache;
pub mod config;
pub mod invalidation;
pub mod monitoring;
pub mod scheduler;
pub mod store;

pub use cache::CacheService;
pub use invalidation::CacheInvalidationService;
pub use monitoring::trace_middleware;
pub use monitoring::CacheMonitoringService;
