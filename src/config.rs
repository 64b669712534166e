// src/config.rs
use crate::invalidation::CleanupPolicy;
use crate::monitoring::AlertThresholds;
use crate::store::RedisStoreConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(format!("expected redis or memory, got {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,

    pub backend: CacheBackend,
    pub redis_url: String,
    pub redis_connect_timeout: Duration,
    pub redis_max_retries: usize,
    pub redis_max_delay_ms: u64,
    pub key_prefix: String,
    pub default_ttl: Duration,

    pub cleanup_policy: CleanupPolicy,
    /// Zero disables the background sweep
    pub cleanup_interval: Duration,
    /// Zero disables background alert evaluation
    pub monitor_interval: Duration,

    pub thresholds: AlertThresholds,
    pub alert_log_capacity: usize,
    /// How far back a performance report looks for alerts
    pub report_window: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3010,
            workers: None,
            backend: CacheBackend::Redis,
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            redis_connect_timeout: Duration::from_millis(5000),
            redis_max_retries: 6,
            redis_max_delay_ms: 2000,
            key_prefix: "lp:".to_string(),
            default_ttl: crate::cache::service::DEFAULT_TTL,
            cleanup_policy: CleanupPolicy::default(),
            cleanup_interval: Duration::ZERO,
            monitor_interval: Duration::from_secs(60),
            thresholds: AlertThresholds::default(),
            alert_log_capacity: crate::monitoring::alerts::DEFAULT_LOG_CAPACITY,
            report_window: Duration::from_secs(3600),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut c = Self::default();

        if let Some(host) = get("BACKEND_HOST") {
            c.host = host;
        }
        if let Some(v) = get("BACKEND_PORT") {
            c.port = parse("BACKEND_PORT", &v)?;
        }
        if let Some(v) = get("ACTIX_WORKERS") {
            c.workers = Some(parse("ACTIX_WORKERS", &v)?);
        }
        if let Some(v) = get("CACHE_BACKEND") {
            c.backend = parse("CACHE_BACKEND", &v)?;
        }
        if let Some(url) = get("REDIS_URL") {
            c.redis_url = url;
        }
        if let Some(v) = get("REDIS_CONNECT_TIMEOUT_MS") {
            c.redis_connect_timeout = Duration::from_millis(parse("REDIS_CONNECT_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("REDIS_MAX_RETRIES") {
            c.redis_max_retries = parse("REDIS_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("REDIS_MAX_DELAY_MS") {
            c.redis_max_delay_ms = parse("REDIS_MAX_DELAY_MS", &v)?;
        }
        // Empty prefix is meaningful, so read it raw
        if let Some(prefix) = lookup("CACHE_KEY_PREFIX") {
            c.key_prefix = prefix.trim().to_string();
        }
        if let Some(v) = get("CACHE_DEFAULT_TTL_SECS") {
            let secs: u64 = parse("CACHE_DEFAULT_TTL_SECS", &v)?;
            if secs == 0 {
                return Err(invalid("CACHE_DEFAULT_TTL_SECS", &v, "must be positive"));
            }
            c.default_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = get("CLEANUP_LIST_GRACE_SECS") {
            c.cleanup_policy.list_grace = Duration::from_secs(parse("CLEANUP_LIST_GRACE_SECS", &v)?);
        }
        if let Some(v) = get("CLEANUP_USER_GRACE_SECS") {
            c.cleanup_policy.user_grace = Duration::from_secs(parse("CLEANUP_USER_GRACE_SECS", &v)?);
        }
        if let Some(v) = get("CLEANUP_INTERVAL_SECS") {
            c.cleanup_interval = Duration::from_secs(parse("CLEANUP_INTERVAL_SECS", &v)?);
        }
        if let Some(v) = get("MONITOR_INTERVAL_SECS") {
            c.monitor_interval = Duration::from_secs(parse("MONITOR_INTERVAL_SECS", &v)?);
        }
        if let Some(v) = get("ALERT_HIT_RATE_FLOOR") {
            c.thresholds.hit_rate_floor = parse_ratio("ALERT_HIT_RATE_FLOOR", &v)?;
        }
        if let Some(v) = get("ALERT_LATENCY_CEILING_MS") {
            let ms: f64 = parse("ALERT_LATENCY_CEILING_MS", &v)?;
            if !ms.is_finite() || ms <= 0.0 {
                return Err(invalid("ALERT_LATENCY_CEILING_MS", &v, "must be positive"));
            }
            c.thresholds.latency_ceiling_ms = ms;
        }
        if let Some(v) = get("ALERT_ERROR_RATE_CEILING") {
            c.thresholds.error_rate_ceiling = parse_ratio("ALERT_ERROR_RATE_CEILING", &v)?;
        }
        if let Some(v) = get("ALERT_MIN_SAMPLES") {
            c.thresholds.min_samples = parse("ALERT_MIN_SAMPLES", &v)?;
        }
        if let Some(v) = get("ALERT_LOG_CAPACITY") {
            let capacity: usize = parse("ALERT_LOG_CAPACITY", &v)?;
            if capacity == 0 {
                return Err(invalid("ALERT_LOG_CAPACITY", &v, "must be positive"));
            }
            c.alert_log_capacity = capacity;
        }
        if c.backend == CacheBackend::Redis && c.key_prefix.is_empty() {
            // Cleanup and flush would otherwise reach every key in the database
            return Err(invalid(
                "CACHE_KEY_PREFIX",
                "",
                "must not be empty with the redis backend",
            ));
        }
        if let Some(v) = get("REPORT_WINDOW_SECS") {
            let secs: u64 = parse("REPORT_WINDOW_SECS", &v)?;
            if secs == 0 {
                return Err(invalid("REPORT_WINDOW_SECS", &v, "must be positive"));
            }
            c.report_window = Duration::from_secs(secs);
        }

        Ok(c)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn redis_store_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            url: self.redis_url.clone(),
            key_prefix: self.key_prefix.clone(),
            connect_timeout: self.redis_connect_timeout,
            max_retries: self.redis_max_retries,
            max_delay_ms: self.redis_max_delay_ms,
            reconnect_backoff: Duration::from_millis(self.redis_max_delay_ms),
            ..RedisStoreConfig::default()
        }
    }
}

/// `NO_DOTENV=true|1` skips loading `.env`
pub fn dotenv_disabled() -> bool {
    env::var("NO_DOTENV")
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn parse_ratio(key: &'static str, value: &str) -> Result<f64, ConfigError> {
    let ratio: f64 = parse(key, value)?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(invalid(key, value, "must be between 0 and 1"));
    }
    Ok(ratio)
}
