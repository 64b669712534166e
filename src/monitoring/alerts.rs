//! Alert types, threshold rules and the bounded recent-alerts log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::cache::PerformanceMetrics;

pub const DEFAULT_LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    LowHitRate,
    HighLatency,
    HighErrorRate,
}

impl AlertKind {
    pub const ALL: [AlertKind; 3] = [
        AlertKind::LowHitRate,
        AlertKind::HighLatency,
        AlertKind::HighErrorRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowHitRate => "low-hit-rate",
            AlertKind::HighLatency => "high-latency",
            AlertKind::HighErrorRate => "high-error-rate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: AlertSeverity,
    pub kind: AlertKind,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, severity: AlertSeverity, value: f64, threshold: f64) -> Self {
        let message = match kind {
            AlertKind::LowHitRate => format!(
                "Cache hit rate {:.1}% is below the {:.1}% floor",
                value * 100.0,
                threshold * 100.0
            ),
            AlertKind::HighLatency => format!(
                "Average cache latency {:.2}ms exceeds the {:.2}ms ceiling",
                value, threshold
            ),
            AlertKind::HighErrorRate => format!(
                "Cache error rate {:.1}% exceeds the {:.1}% ceiling",
                value * 100.0,
                threshold * 100.0
            ),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            severity,
            kind,
            message,
            value,
            threshold,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertThresholds {
    pub hit_rate_floor: f64,
    pub latency_ceiling_ms: f64,
    pub error_rate_ceiling: f64,
    /// Rules stay quiet until this many samples back them
    pub min_samples: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            hit_rate_floor: 0.5,
            latency_ceiling_ms: 100.0,
            error_rate_ceiling: 0.05,
            min_samples: 20,
        }
    }
}

/// A crossed threshold: current value, the threshold, and severity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breach {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub value: f64,
    pub threshold: f64,
}

impl AlertThresholds {
    /// Evaluate one rule. `None` when the condition does not hold or there
    /// are too few samples to judge.
    pub fn check(&self, kind: AlertKind, m: &PerformanceMetrics) -> Option<Breach> {
        let (value, threshold, crossed, critical) = match kind {
            AlertKind::LowHitRate => {
                if m.lookups() < self.min_samples {
                    return None;
                }
                let rate = m.hit_rate();
                (
                    rate,
                    self.hit_rate_floor,
                    rate < self.hit_rate_floor,
                    rate < self.hit_rate_floor / 2.0,
                )
            }
            AlertKind::HighLatency => {
                if m.operations < self.min_samples {
                    return None;
                }
                let avg = m.average_latency_ms();
                (
                    avg,
                    self.latency_ceiling_ms,
                    avg > self.latency_ceiling_ms,
                    avg > self.latency_ceiling_ms * 2.0,
                )
            }
            AlertKind::HighErrorRate => {
                if m.operations < self.min_samples {
                    return None;
                }
                let rate = m.error_rate();
                (
                    rate,
                    self.error_rate_ceiling,
                    rate > self.error_rate_ceiling,
                    rate > self.error_rate_ceiling * 2.0,
                )
            }
        };

        crossed.then_some(Breach {
            kind,
            severity: if critical {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            },
            value,
            threshold,
        })
    }
}

/// Fixed-capacity log, oldest evicted first
#[derive(Debug)]
pub struct AlertLog {
    capacity: usize,
    entries: VecDeque<Alert>,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, alert: Alert) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(alert);
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn since(&self, start: DateTime<Utc>) -> Vec<Alert> {
        self.entries
            .iter()
            .rev()
            .filter(|a| a.timestamp >= start)
            .cloned()
            .collect()
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(hits: u64, misses: u64, errors: u64, latency_ms: u64) -> PerformanceMetrics {
        let operations = hits + misses;
        PerformanceMetrics {
            hits,
            misses,
            errors,
            operations,
            total_latency_us: latency_ms * 1000 * operations,
            ..Default::default()
        }
    }

    #[test]
    fn test_hit_rate_rule() {
        let t = AlertThresholds::default();
        assert!(t.check(AlertKind::LowHitRate, &metrics(15, 5, 0, 1)).is_none());

        let breach = t.check(AlertKind::LowHitRate, &metrics(8, 12, 0, 1)).unwrap();
        assert_eq!(breach.severity, AlertSeverity::Warning);
        assert_eq!(breach.value, 0.4);

        let breach = t.check(AlertKind::LowHitRate, &metrics(2, 18, 0, 1)).unwrap();
        assert_eq!(breach.severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_rules_need_samples() {
        let t = AlertThresholds::default();
        assert!(t.check(AlertKind::LowHitRate, &metrics(0, 5, 0, 1)).is_none());
        assert!(t.check(AlertKind::HighErrorRate, &metrics(0, 5, 5, 1)).is_none());
    }

    #[test]
    fn test_latency_and_error_rules() {
        let t = AlertThresholds::default();
        let slow = t.check(AlertKind::HighLatency, &metrics(20, 0, 0, 150)).unwrap();
        assert_eq!(slow.severity, AlertSeverity::Warning);
        let very_slow = t.check(AlertKind::HighLatency, &metrics(20, 0, 0, 250)).unwrap();
        assert_eq!(very_slow.severity, AlertSeverity::Critical);

        let failing = t.check(AlertKind::HighErrorRate, &metrics(20, 0, 3, 1)).unwrap();
        assert_eq!(failing.kind, AlertKind::HighErrorRate);
        assert_eq!(failing.severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_log_evicts_oldest() {
        let mut log = AlertLog::new(2);
        for kind in AlertKind::ALL {
            log.push(Alert::new(kind, AlertSeverity::Warning, 1.0, 0.5));
        }
        assert_eq!(log.len(), 2);
        let recent = log.recent(10);
        assert_eq!(recent[0].kind, AlertKind::HighErrorRate);
        assert_eq!(recent[1].kind, AlertKind::HighLatency);
        assert_eq!(log.recent(1).len(), 1);
    }

    #[test]
    fn test_alert_wire_format() {
        let alert = Alert::new(AlertKind::LowHitRate, AlertSeverity::Critical, 0.2, 0.5);
        let v = serde_json::to_value(&alert).unwrap();
        assert_eq!(v["kind"], "low-hit-rate");
        assert_eq!(v["severity"], "critical");
        assert!(alert.message.contains("20.0%"));
    }
}
