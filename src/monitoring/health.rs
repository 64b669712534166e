//! Cache health evaluation
//!
//! Health is a pure function of a metrics snapshot and the thresholds:
//! - error rate above the ceiling: unhealthy
//! - hit rate below the floor: degraded
//! - average latency above the ceiling: degraded
//!
//! The worst status wins; every failing rule contributes a reason.

use super::alerts::{AlertKind, AlertThresholds};
use crate::cache::PerformanceMetrics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthState {
    #[serde(rename = "healthy")]
    Healthy,
    #[serde(rename = "degraded")]
    Degraded,
    #[serde(rename = "unhealthy")]
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Degraded => write!(f, "degraded"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub status: HealthState,
    pub reasons: Vec<String>,
}

pub fn evaluate(metrics: &PerformanceMetrics, thresholds: &AlertThresholds) -> HealthReport {
    let mut status = HealthState::Healthy;
    let mut reasons = Vec::new();

    for kind in AlertKind::ALL {
        let Some(breach) = thresholds.check(kind, metrics) else {
            continue;
        };
        let (state, reason) = match kind {
            AlertKind::HighErrorRate => (
                HealthState::Unhealthy,
                format!(
                    "error rate {:.1}% above {:.1}%",
                    breach.value * 100.0,
                    breach.threshold * 100.0
                ),
            ),
            AlertKind::LowHitRate => (
                HealthState::Degraded,
                format!(
                    "hit rate {:.1}% below {:.1}%",
                    breach.value * 100.0,
                    breach.threshold * 100.0
                ),
            ),
            AlertKind::HighLatency => (
                HealthState::Degraded,
                format!(
                    "average latency {:.2}ms above {:.2}ms",
                    breach.value, breach.threshold
                ),
            ),
        };
        status = status.max(state);
        reasons.push(reason);
    }

    HealthReport { status, reasons }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> AlertThresholds {
        AlertThresholds {
            min_samples: 10,
            ..AlertThresholds::default()
        }
    }

    #[test]
    fn test_idle_cache_is_healthy() {
        let report = evaluate(&PerformanceMetrics::default(), &thresholds());
        assert_eq!(report.status, HealthState::Healthy);
        assert!(report.reasons.is_empty());
    }

    #[test]
    fn test_low_hit_rate_degrades() {
        let m = PerformanceMetrics {
            hits: 2,
            misses: 8,
            operations: 10,
            ..Default::default()
        };
        let report = evaluate(&m, &thresholds());
        assert_eq!(report.status, HealthState::Degraded);
        assert_eq!(report.reasons.len(), 1);
    }

    #[test]
    fn test_errors_dominate() {
        let m = PerformanceMetrics {
            hits: 2,
            misses: 8,
            errors: 5,
            operations: 15,
            ..Default::default()
        };
        let report = evaluate(&m, &thresholds());
        assert_eq!(report.status, HealthState::Unhealthy);
        assert_eq!(report.reasons.len(), 2);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(HealthState::Degraded).unwrap(),
            serde_json::json!("degraded")
        );
    }
}
