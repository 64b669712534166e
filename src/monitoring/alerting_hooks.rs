// src/monitoring/alerting_hooks.rs - Alert webhook notifications
//
// Forwards newly raised cache alerts to an HTTP endpoint. Delivery is
// non-blocking and never fails the monitoring call that produced the alerts.

use super::alerts::Alert;
use serde_json::json;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AlertingHooksConfig {
    pub webhook_url: Option<String>,
    pub timeout: Duration,
}

impl AlertingHooksConfig {
    /// Environment variables:
    /// - `ALERT_WEBHOOK_URL`: URL receiving a JSON POST per batch of new alerts.
    ///   Unset disables delivery.
    pub fn from_env() -> Self {
        let webhook_url = env::var("ALERT_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        if webhook_url.is_some() {
            tracing::info!(webhook_url = ?webhook_url, "Cache alert webhook enabled");
        } else {
            tracing::debug!("Cache alert webhook disabled (ALERT_WEBHOOK_URL not set)");
        }

        Self {
            webhook_url,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn disabled() -> Self {
        Self {
            webhook_url: None,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

pub fn alerts_payload(alerts: &[Alert]) -> serde_json::Value {
    json!({
        "source": "pathcache",
        "count": alerts.len(),
        "alerts": alerts,
    })
}

/// Spawn delivery of `alerts`. Outside a tokio runtime this is a no-op.
pub fn send_alerts(config: &AlertingHooksConfig, alerts: &[Alert]) {
    if alerts.is_empty() {
        return;
    }
    let Some(webhook_url) = config.webhook_url.clone() else {
        return;
    };
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::debug!("No runtime available, skipping alert webhook");
        return;
    };

    let payload = alerts_payload(alerts);
    let count = alerts.len();
    let timeout = config.timeout;

    handle.spawn(async move {
        match send_webhook(&webhook_url, &payload, timeout).await {
            Ok(()) => tracing::info!(webhook_url = %webhook_url, count, "Alert webhook sent"),
            Err(e) => tracing::warn!(
                webhook_url = %webhook_url,
                count,
                error = %e,
                "Failed to send alert webhook (non-fatal)"
            ),
        }
    });
}

async fn send_webhook(
    url: &str,
    payload: &serde_json::Value,
    timeout: Duration,
) -> Result<(), reqwest::Error> {
    reqwest::Client::new()
        .post(url)
        .json(payload)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::alerts::{AlertKind, AlertSeverity};

    #[test]
    fn test_disabled_config() {
        let config = AlertingHooksConfig::disabled();
        assert!(!config.is_enabled());
        // No URL, no runtime: must not panic
        send_alerts(
            &config,
            &[Alert::new(AlertKind::HighLatency, AlertSeverity::Warning, 150.0, 100.0)],
        );
    }

    #[test]
    fn test_payload_shape() {
        let alerts = vec![Alert::new(
            AlertKind::HighErrorRate,
            AlertSeverity::Critical,
            0.2,
            0.05,
        )];
        let payload = alerts_payload(&alerts);
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["alerts"][0]["kind"], "high-error-rate");
    }
}
