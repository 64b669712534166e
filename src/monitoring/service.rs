//! Cache monitoring and alerting
//!
//! Reads `CacheService` metrics without mutating them, derives rates and
//! health, and raises alerts on threshold transitions. An alert kind fires
//! once when its condition starts to hold and stays quiet until the
//! condition clears, so repeated polling never double-reports.

use super::alerting_hooks::{self, AlertingHooksConfig};
use super::alerts::{Alert, AlertKind, AlertLog, AlertThresholds};
use super::health::{self, HealthReport};
use super::metrics as prom;
use crate::cache::{CacheService, PerformanceMetrics};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    #[serde(flatten)]
    pub counters: PerformanceMetrics,
    pub hit_rate: f64,
    pub error_rate: f64,
    pub average_latency_ms: f64,
}

impl From<PerformanceMetrics> for MetricsSummary {
    fn from(m: PerformanceMetrics) -> Self {
        Self {
            counters: m,
            hit_rate: m.hit_rate(),
            error_rate: m.error_rate(),
            average_latency_ms: m.average_latency_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_secs: u64,
    pub metrics: MetricsSummary,
    pub health: HealthReport,
    pub thresholds: AlertThresholds,
    pub alert_counts: BTreeMap<String, u64>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Default)]
struct AlertState {
    log: AlertLog,
    /// Kinds whose condition held at the last evaluation
    active: HashSet<AlertKind>,
}

#[derive(Clone)]
pub struct CacheMonitoringService {
    cache: CacheService,
    thresholds: AlertThresholds,
    report_window: Duration,
    hooks: AlertingHooksConfig,
    state: Arc<Mutex<AlertState>>,
}

impl CacheMonitoringService {
    pub fn new(cache: CacheService, thresholds: AlertThresholds, log_capacity: usize) -> Self {
        Self {
            cache,
            thresholds,
            report_window: Duration::from_secs(3600),
            hooks: AlertingHooksConfig::disabled(),
            state: Arc::new(Mutex::new(AlertState {
                log: AlertLog::new(log_capacity),
                active: HashSet::new(),
            })),
        }
    }

    pub fn with_hooks(mut self, hooks: AlertingHooksConfig) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_report_window(mut self, window: Duration) -> Self {
        self.report_window = window;
        self
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub fn get_performance_metrics(&self) -> MetricsSummary {
        self.cache.get_metrics().into()
    }

    pub fn get_health_status(&self) -> HealthReport {
        health::evaluate(&self.cache.get_metrics(), &self.thresholds)
    }

    /// Evaluate every rule against a fresh sample. Returns only the alerts
    /// created by this call.
    pub fn monitor_and_alert(&self) -> Vec<Alert> {
        let metrics = self.cache.get_metrics();
        let mut new_alerts = Vec::new();

        {
            let mut state = self.state.lock();
            for kind in AlertKind::ALL {
                match self.thresholds.check(kind, &metrics) {
                    Some(breach) => {
                        if state.active.insert(kind) {
                            let alert =
                                Alert::new(kind, breach.severity, breach.value, breach.threshold);
                            state.log.push(alert.clone());
                            new_alerts.push(alert);
                        }
                    }
                    None => {
                        if state.active.remove(&kind) {
                            tracing::info!(kind = kind.as_str(), "Cache alert condition cleared");
                        }
                    }
                }
            }
        }

        for alert in &new_alerts {
            prom::ALERTS_RAISED_TOTAL
                .with_label_values(&[alert.kind.as_str(), alert.severity.as_str()])
                .inc();
            tracing::warn!(
                kind = alert.kind.as_str(),
                severity = alert.severity.as_str(),
                value = alert.value,
                threshold = alert.threshold,
                "{}",
                alert.message
            );
        }
        alerting_hooks::send_alerts(&self.hooks, &new_alerts);

        new_alerts
    }

    /// Newest first, at most `limit`
    pub fn get_recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.state.lock().log.recent(limit)
    }

    pub fn generate_performance_report(&self) -> PerformanceReport {
        let metrics = self.cache.get_metrics();
        let generated_at = Utc::now();
        let window = chrono::Duration::from_std(self.report_window)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let window_start = generated_at - window;

        let alerts = self.state.lock().log.since(window_start);
        let mut alert_counts = BTreeMap::new();
        for alert in &alerts {
            *alert_counts.entry(alert.kind.as_str().to_string()).or_insert(0) += 1;
        }

        PerformanceReport {
            generated_at,
            window_start,
            window_secs: self.report_window.as_secs(),
            metrics: metrics.into(),
            health: health::evaluate(&metrics, &self.thresholds),
            thresholds: self.thresholds.clone(),
            alert_counts,
            alerts,
            recommendations: self.recommendations(&metrics),
        }
    }

    fn recommendations(&self, m: &PerformanceMetrics) -> Vec<String> {
        let mut out = Vec::new();
        let t = &self.thresholds;
        if m.lookups() >= t.min_samples && m.hit_rate() < t.hit_rate_floor {
            out.push(
                "Hit rate is low: check that reads go through get_or_set and that TTLs are not \
                 shorter than typical re-read intervals"
                    .to_string(),
            );
        }
        if m.operations >= t.min_samples && m.average_latency_ms() > t.latency_ceiling_ms {
            out.push(
                "Store latency is high: check key-value store load and network path".to_string(),
            );
        }
        if m.operations >= t.min_samples && m.error_rate() > t.error_rate_ceiling {
            out.push(
                "Store errors are elevated: check connectivity; reads are falling back to the \
                 database"
                    .to_string(),
            );
        }
        if m.operations < t.min_samples {
            out.push(format!(
                "Only {} operations recorded; thresholds apply from {}",
                m.operations, t.min_samples
            ));
        }
        out
    }
}
