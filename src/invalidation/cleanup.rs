//! Scheduled sweep heuristics
//!
//! Classification is a pure function of one key's raw value, its remaining
//! TTL and the clock. The sweep itself lives on the invalidation service.

use crate::cache::entry::decode_header;
use crate::cache::keys;
use crate::store::KeyTtl;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CleanupPolicy {
    /// Path listings older than this are swept even if their TTL is longer
    pub list_grace: Duration,
    /// Per-user views older than this are swept
    pub user_grace: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            list_grace: Duration::from_secs(15 * 60),
            user_grace: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupCategory {
    /// Value is not a cache envelope
    Corrupt,
    /// Key has no expiry; every cache write sets one
    MissingTtl,
    StaleLists,
    StaleUser,
}

impl CleanupCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupCategory::Corrupt => "corrupt",
            CleanupCategory::MissingTtl => "missing-ttl",
            CleanupCategory::StaleLists => "stale-lists",
            CleanupCategory::StaleUser => "stale-user",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub total_keys_removed: u64,
    pub per_category: BTreeMap<String, u64>,
    pub keys_scanned: u64,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Decide whether `key` should be swept, and why.
pub fn classify(
    key: &str,
    raw: &str,
    ttl: KeyTtl,
    now_millis: i64,
    policy: &CleanupPolicy,
) -> Option<CleanupCategory> {
    let header = match decode_header(raw) {
        Some(header) => header,
        None => return Some(CleanupCategory::Corrupt),
    };

    match ttl {
        KeyTtl::Missing => return None,
        KeyTtl::Persistent => return Some(CleanupCategory::MissingTtl),
        KeyTtl::Expires(_) => {}
    }

    let age = header.age_at(now_millis);
    if key.starts_with(&format!("{}:", keys::PATHS_LIST)) && age > policy.list_grace {
        return Some(CleanupCategory::StaleLists);
    }
    if key.starts_with(&format!("{}:", keys::USER)) && age > policy.user_grace {
        return Some(CleanupCategory::StaleUser);
    }
    None
}
