use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// Global Prometheus registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn service_and_env() -> (String, String) {
    let service = std::env::var("APP_SERVICE")
        .ok()
        .unwrap_or_else(|| env!("APP_SERVICE_DEFAULT").to_string());
    let env_name = std::env::var("APP_ENV")
        .ok()
        .unwrap_or_else(|| env!("APP_ENV_DEFAULT").to_string());
    (service, env_name)
}

fn counter(name: &str, help: &str) -> IntCounter {
    let (service, env_name) = service_and_env();
    let c = IntCounter::with_opts(
        Opts::new(name, help)
            .const_label("service", service)
            .const_label("env", env_name),
    )
    .expect("valid counter opts");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let (service, env_name) = service_and_env();
    let opts = Opts::new(name, help)
        .const_label("service", service)
        .const_label("env", env_name);
    let cv = IntCounterVec::new(opts, labels).expect("valid counter vec opts");
    REGISTRY.register(Box::new(cv.clone())).ok();
    cv
}

fn histogram_vec(name: &str, help: &str, buckets: Vec<f64>, labels: &[&str]) -> HistogramVec {
    let (service, env_name) = service_and_env();
    let mut opts = HistogramOpts::new(name, help).buckets(buckets);
    opts.common_opts = opts
        .common_opts
        .const_label("service", service)
        .const_label("env", env_name);
    let hv = HistogramVec::new(opts, labels).expect("valid histogram opts");
    REGISTRY.register(Box::new(hv.clone())).ok();
    hv
}

// App info gauge (const)
pub static APP_INFO: Lazy<IntGauge> = Lazy::new(|| {
    let (service, env_name) = service_and_env();
    let g = IntGauge::with_opts(
        Opts::new("app_info", "Application info gauge")
            .const_label("service", &service)
            .const_label("env", &env_name)
            .const_label("version", env!("CARGO_PKG_VERSION"))
            .const_label("git_sha", env!("GIT_SHA"))
            .const_label("build_time", env!("BUILD_TIME")),
    )
    .expect("valid app info opts");
    REGISTRY.register(Box::new(g.clone())).ok();
    g.set(1);
    g
});

pub static CACHE_HITS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| counter("cache_hits_total", "Total cache hits"));

pub static CACHE_MISSES_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| counter("cache_misses_total", "Total cache misses"));

pub static CACHE_ERRORS_TOTAL: Lazy<IntCounter> =
    Lazy::new(|| counter("cache_errors_total", "Total cache store or decode errors"));

pub static INVALIDATED_KEYS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "cache_invalidated_keys_total",
        "Keys removed by invalidation, partitioned by source",
        &["source"],
    )
});

pub static ALERTS_RAISED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    counter_vec(
        "cache_alerts_raised_total",
        "Alerts raised by the cache monitor",
        &["kind", "severity"],
    )
});

pub static STORE_OP_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    histogram_vec(
        "cache_store_op_latency_ms",
        "Key-value store round-trip latency in milliseconds",
        vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0],
        &["op"],
    )
});

pub static REQUEST_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    histogram_vec(
        "request_latency_ms",
        "HTTP request latency in milliseconds",
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0],
        &["method", "route", "status_class"],
    )
});

pub fn observe_store_latency_ms(op: &str, duration_ms: f64) {
    STORE_OP_LATENCY_MS.with_label_values(&[op]).observe(duration_ms);
}

pub fn record_invalidated_keys(source: &str, count: u64) {
    if count > 0 {
        INVALIDATED_KEYS_TOTAL
            .with_label_values(&[source])
            .inc_by(count);
    }
}

// Exporter for Prometheus text format
pub fn export_prometheus() -> String {
    Lazy::force(&APP_INFO);
    let metric_families = REGISTRY.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_cache_counters() {
        CACHE_HITS_TOTAL.inc();
        observe_store_latency_ms("get", 1.5);
        let text = export_prometheus();
        assert!(text.contains("cache_hits_total"));
        assert!(text.contains("cache_store_op_latency_ms"));
        assert!(text.contains("app_info"));
    }
}
