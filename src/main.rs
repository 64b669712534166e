// src/main.rs - pathcache server entry point
use pathcache::api::{start_api_server, AppState};
use pathcache::cache::CacheService;
use pathcache::config::{self, ApiConfig, CacheBackend};
use pathcache::invalidation::CacheInvalidationService;
use pathcache::monitoring::{
    tracing_config, AlertingHooksConfig, CacheMonitoringService, MonitoringConfig,
};
use pathcache::scheduler;
use pathcache::store::{KeyValueStore, MemoryStore, RedisStore};
use std::sync::Arc;
use tracing::{error, info, warn};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if !config::dotenv_disabled() {
        dotenvy::dotenv().ok();
    }

    let monitoring_config = MonitoringConfig::from_env();
    let _log_guard = tracing_config::init_tracing(&monitoring_config)?;

    let config = ApiConfig::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = env!("GIT_SHA"),
        backend = ?config.backend,
        "Starting pathcache"
    );

    // Redis is created once here and shared by every service
    let mut redis: Option<RedisStore> = None;
    let store: Arc<dyn KeyValueStore> = match config.backend {
        CacheBackend::Redis => {
            let redis_store = RedisStore::new(config.redis_store_config());
            match redis_store.connect().await {
                Ok(()) => info!(url = %config.redis_url, "Connected to Redis"),
                // The connection manager retries on first use
                Err(e) => warn!(
                    url = %config.redis_url,
                    error = %e,
                    "Redis unavailable at startup; cache ops will fail soft until it recovers"
                ),
            }
            redis = Some(redis_store.clone());
            Arc::new(redis_store)
        }
        CacheBackend::Memory => {
            info!("Using in-process memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let cache = CacheService::with_default_ttl(store, config.default_ttl);
    let invalidation =
        CacheInvalidationService::with_policy(cache.clone(), config.cleanup_policy.clone());
    let monitoring = CacheMonitoringService::new(
        cache.clone(),
        config.thresholds.clone(),
        config.alert_log_capacity,
    )
    .with_hooks(AlertingHooksConfig::from_env())
    .with_report_window(config.report_window);

    let background = scheduler::start(
        invalidation.clone(),
        monitoring.clone(),
        config.cleanup_interval,
        config.monitor_interval,
    );

    let state = AppState::from_parts(cache, invalidation, monitoring);
    let result = start_api_server(&config, state)?.await;

    background.abort();
    if let Some(redis) = redis {
        redis.disconnect().await;
    }
    info!("pathcache stopped");
    result
}
