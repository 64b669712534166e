//! Background drivers for periodic cache maintenance
//!
//! The services never schedule themselves; these tasks call them on a fixed
//! interval. A zero interval disables the task.

use crate::invalidation::CacheInvalidationService;
use crate::monitoring::CacheMonitoringService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Default)]
pub struct SchedulerHandles {
    pub cleanup: Option<JoinHandle<()>>,
    pub monitor: Option<JoinHandle<()>>,
}

impl SchedulerHandles {
    pub fn abort(&self) {
        if let Some(h) = &self.cleanup {
            h.abort();
        }
        if let Some(h) = &self.monitor {
            h.abort();
        }
    }
}

fn interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Run `scheduled_cleanup` every `period`
pub fn start_cleanup_task(
    service: CacheInvalidationService,
    period: Duration,
) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        debug!("Scheduled cache cleanup disabled");
        return None;
    }
    info!(interval_secs = period.as_secs(), "Starting scheduled cache cleanup task");

    Some(tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            let report = service.scheduled_cleanup().await;
            if report.total_keys_removed > 0 || !report.errors.is_empty() {
                info!(
                    removed = report.total_keys_removed,
                    scanned = report.keys_scanned,
                    errors = report.errors.len(),
                    "Scheduled cleanup finished"
                );
            } else {
                debug!(scanned = report.keys_scanned, "Scheduled cleanup found nothing");
            }
        }
    }))
}

/// Run `monitor_and_alert` every `period`
pub fn start_monitor_task(
    service: CacheMonitoringService,
    period: Duration,
) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        debug!("Background cache monitoring disabled");
        return None;
    }
    info!(interval_secs = period.as_secs(), "Starting cache monitoring task");

    Some(tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            let raised = service.monitor_and_alert();
            if !raised.is_empty() {
                debug!(count = raised.len(), "Monitoring pass raised alerts");
            }
        }
    }))
}

pub fn start(
    invalidation: CacheInvalidationService,
    monitoring: CacheMonitoringService,
    cleanup_every: Duration,
    monitor_every: Duration,
) -> SchedulerHandles {
    SchedulerHandles {
        cleanup: start_cleanup_task(invalidation, cleanup_every),
        monitor: start_monitor_task(monitoring, monitor_every),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheService;
    use crate::monitoring::AlertThresholds;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_zero_interval_disables() {
        let cache = CacheService::new(Arc::new(MemoryStore::new()));
        let handles = start(
            CacheInvalidationService::new(cache.clone()),
            CacheMonitoringService::new(cache, AlertThresholds::default(), 10),
            Duration::ZERO,
            Duration::ZERO,
        );
        assert!(handles.cleanup.is_none());
        assert!(handles.monitor.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_runs_on_interval() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("path:1:detail", "{{{", Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        let cache = CacheService::new(store.clone());

        let handle =
            start_cleanup_task(CacheInvalidationService::new(cache), Duration::from_millis(20))
                .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!store.exists("path:1:detail").await.unwrap());
        handle.abort();
    }
}
