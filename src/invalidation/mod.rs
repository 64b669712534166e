//! Cache invalidation engine
//!
//! Turns domain change events into key removals. Everything here is
//! best-effort: failures on one target are collected and the remaining
//! targets still run. Multi-key deletions are two-phase (scan, then delete)
//! and not atomic; a key written between the phases survives until the next
//! sweep or its own TTL.

pub mod cleanup;
pub mod events;
pub mod rules;

pub use cleanup::{CleanupCategory, CleanupPolicy, CleanupReport};
pub use events::{EntityType, EventError, InvalidationEvent, InvalidationResult};

use crate::cache::{keys, CacheService, Outcome};
use crate::monitoring::metrics as prom;
use crate::store::{is_pattern, validate_pattern, KeyTtl};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionOutcome {
    pub deleted_count: u64,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct CacheInvalidationService {
    cache: CacheService,
    policy: CleanupPolicy,
}

impl CacheInvalidationService {
    pub fn new(cache: CacheService) -> Self {
        Self::with_policy(cache, CleanupPolicy::default())
    }

    pub fn with_policy(cache: CacheService, policy: CleanupPolicy) -> Self {
        Self { cache, policy }
    }

    pub fn policy(&self) -> &CleanupPolicy {
        &self.policy
    }

    /// Remove every key the event's templates resolve to.
    ///
    /// Never fails: per-target problems land in `errors` and `success` stays
    /// true. Only an event that cannot be resolved at all (invalid ids)
    /// reports `success: false`.
    pub async fn invalidate(&self, event: &InvalidationEvent) -> InvalidationResult {
        let mut result = InvalidationResult {
            success: true,
            ..Default::default()
        };

        if let Err(e) = event.validate() {
            warn!(entity_type = %event.entity_type, error = %e, "Rejected invalidation event");
            result.success = false;
            result.errors.push(e.to_string());
            return result;
        }

        let started = Instant::now();
        for (template, target) in rules::resolve_targets(event) {
            let outcome = if is_pattern(&target) {
                self.delete_matching(&target, &mut result.errors).await
            } else {
                self.delete_exact(&target, &mut result.errors).await
            };
            debug!(template, target = %target, removed = outcome.len(), "Invalidation target processed");
            for key in outcome {
                if !result.invalidated_keys.contains(&key) {
                    result.invalidated_keys.push(key);
                }
            }
        }

        prom::record_invalidated_keys("event", result.invalidated_keys.len() as u64);
        info!(
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            removed = result.invalidated_keys.len(),
            errors = result.errors.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Cache invalidated"
        );
        result
    }

    /// Fire-and-forget invalidation for mutation paths that do not wait.
    ///
    /// The attempt is made once; failures are logged and otherwise dropped.
    /// Anything left behind expires with its TTL.
    pub fn spawn_invalidate(&self, event: InvalidationEvent) -> JoinHandle<InvalidationResult> {
        let service = self.clone();
        tokio::spawn(async move {
            let result = service.invalidate(&event).await;
            if !result.success || !result.errors.is_empty() {
                warn!(
                    entity_type = %event.entity_type,
                    entity_id = %event.entity_id,
                    errors = ?result.errors,
                    "Background invalidation incomplete; stale entries will expire by TTL"
                );
            }
            result
        })
    }

    /// Delete every key matching `pattern`, returning how many were removed.
    /// Zero matches is not an error; store failures are logged and counted.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> u64 {
        let outcome = self.clear_pattern(pattern).await;
        for e in &outcome.errors {
            warn!(pattern, error = %e, "Pattern invalidation error");
        }
        outcome.deleted_count
    }

    /// Like `invalidate_by_pattern`, but hands the errors back to the caller.
    /// A malformed glob is reported as an error without touching the store.
    pub async fn clear_pattern(&self, pattern: &str) -> DeletionOutcome {
        if let Err(e) = validate_pattern(pattern) {
            return DeletionOutcome {
                deleted_count: 0,
                errors: vec![e.to_string()],
            };
        }
        self.delete_pattern_batched(pattern).await
    }

    /// Clear the user's namespace, e.g. on logout or profile change
    pub async fn invalidate_user_cache(&self, user_id: &str) -> DeletionOutcome {
        if let Err(e) = events::check_id("userId", user_id) {
            return DeletionOutcome {
                deleted_count: 0,
                errors: vec![e.to_string()],
            };
        }
        let outcome = self
            .delete_pattern_batched(&keys::user_namespace(user_id.trim()))
            .await;
        info!(user_id, removed = outcome.deleted_count, "User cache cleared");
        outcome
    }

    pub async fn invalidate_key(&self, key: &str) -> bool {
        let removed = self.cache.delete(key).await;
        prom::record_invalidated_keys("key", removed as u64);
        removed
    }

    /// Sweep the namespace for entries the cleanup heuristics reject.
    ///
    /// Meant to be driven by an external scheduler. Running it twice with no
    /// writes in between removes nothing the second time. Keys outside
    /// `keys::NAMESPACES` are never classified.
    pub async fn scheduled_cleanup(&self) -> CleanupReport {
        let started = Instant::now();
        let mut report = CleanupReport::default();

        let mut errors = Vec::new();
        let store = self.cache.store();
        let scanned = self.cache.untracked("cleanup_scan", store.scan("*")).await;
        let candidates: Vec<String> = match scanned {
            Ok(found) => found.into_iter().filter(|key| keys::is_owned(key)).collect(),
            Err(e) => {
                errors.push(format!("*: {}", e));
                Vec::new()
            }
        };
        report.keys_scanned = candidates.len() as u64;

        // Phase one: classify
        let now = chrono::Utc::now().timestamp_millis();
        let mut doomed: BTreeMap<CleanupCategory, Vec<String>> = BTreeMap::new();
        for key in candidates {
            let raw = match self.cache.untracked("cleanup_get", store.get(&key)).await {
                Ok(Some(raw)) => raw,
                // Expired since the scan
                Ok(None) => continue,
                Err(e) => {
                    errors.push(format!("{}: {}", key, e));
                    continue;
                }
            };
            let ttl = match self.cache.untracked("cleanup_ttl", store.ttl(&key)).await {
                Ok(ttl) => ttl,
                Err(e) => {
                    errors.push(format!("{}: {}", key, e));
                    continue;
                }
            };
            if ttl == KeyTtl::Missing {
                continue;
            }
            if let Some(category) = cleanup::classify(&key, &raw, ttl, now, &self.policy) {
                doomed.entry(category).or_default().push(key);
            }
        }

        // Phase two: delete per category
        for (category, batch) in doomed {
            match self.cache.untracked("cleanup_delete", store.delete_many(&batch)).await {
                Ok(n) => {
                    report.total_keys_removed += n;
                    report.per_category.insert(category.as_str().to_string(), n);
                }
                Err(e) => errors.push(format!("{}: {}", category.as_str(), e)),
            }
        }

        report.errors = errors;
        report.duration_ms = started.elapsed().as_millis() as u64;
        prom::record_invalidated_keys("cleanup", report.total_keys_removed);
        info!(
            scanned = report.keys_scanned,
            removed = report.total_keys_removed,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Scheduled cache cleanup finished"
        );
        report
    }

    async fn scan(&self, pattern: &str, errors: &mut Vec<String>) -> Vec<String> {
        let (result, elapsed) = self.cache.timed("scan", self.cache.store().scan(pattern)).await;
        match result {
            Ok(keys) => {
                self.cache.record("scan", Outcome::Neutral, elapsed);
                keys
            }
            Err(e) => {
                errors.push(format!("{}: {}", pattern, e));
                Vec::new()
            }
        }
    }

    /// Scan, then delete key by key so the caller learns exactly what went
    async fn delete_matching(&self, pattern: &str, errors: &mut Vec<String>) -> Vec<String> {
        let matched = self.scan(pattern, errors).await;
        let mut removed = Vec::with_capacity(matched.len());
        for key in matched {
            if self.delete_exact_inner(&key, errors).await {
                removed.push(key);
            }
        }
        removed
    }

    async fn delete_exact(&self, key: &str, errors: &mut Vec<String>) -> Vec<String> {
        if self.delete_exact_inner(key, errors).await {
            vec![key.to_string()]
        } else {
            Vec::new()
        }
    }

    async fn delete_exact_inner(&self, key: &str, errors: &mut Vec<String>) -> bool {
        let (result, elapsed) = self.cache.timed("delete", self.cache.store().delete(key)).await;
        match result {
            Ok(true) => {
                self.cache.record("delete", Outcome::Delete, elapsed);
                true
            }
            Ok(false) => {
                self.cache.record("delete", Outcome::Neutral, elapsed);
                false
            }
            Err(e) => {
                errors.push(format!("{}: {}", key, e));
                false
            }
        }
    }

    /// Scan, then delete in batches; only the count is reported
    async fn delete_pattern_batched(&self, pattern: &str) -> DeletionOutcome {
        let mut outcome = DeletionOutcome::default();
        let matched = self.scan(pattern, &mut outcome.errors).await;
        if matched.is_empty() {
            return outcome;
        }
        let (result, elapsed) = self
            .cache
            .timed("delete_many", self.cache.store().delete_many(&matched))
            .await;
        match result {
            Ok(n) => {
                self.cache.record("delete_many", Outcome::Delete, elapsed);
                outcome.deleted_count = n;
            }
            Err(e) => outcome.errors.push(format!("{}: {}", pattern, e)),
        }
        prom::record_invalidated_keys("pattern", outcome.deleted_count);
        outcome
    }
}
