//! Cache service traits
//!
//! Implemented by the Redis providers and by the in-process providers. A
//! cache miss is always `Ok(None)` (or `false`/empty), never an error.

use super::errors::CacheResult;
use crate::models::ConfigEntry;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Result of a version-gated write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The candidate version was newer (or nothing was cached) and was stored
    Applied,
    /// The cache already held an equal or higher version; nothing changed
    Stale,
}

/// Versioned blob cache for per-project remote configuration
pub trait RemoteConfigCache: Send + Sync {
    /// Register server-side scripts. No-op for in-process providers.
    fn load_scripts(&self) -> impl Future<Output = CacheResult<()>> + Send;

    /// Cached version; the read slides the entry TTL.
    fn get_version(&self, project_id: &str)
        -> impl Future<Output = CacheResult<Option<i64>>> + Send;

    /// Cached blob; the read slides the entry TTL.
    fn get_data(&self, project_id: &str)
        -> impl Future<Output = CacheResult<Option<String>>> + Send;

    /// Store `entry` only if its version is newer than the cached one.
    fn update(&self, entry: &ConfigEntry) -> impl Future<Output = CacheResult<UpdateOutcome>> + Send;

    fn health_check(&self) -> impl Future<Output = CacheResult<bool>> + Send;

    fn provider_name(&self) -> &'static str;
}

/// Notification window cache: active time, views, click counters and the
/// rendered feed of each project, always written and expired together.
pub trait NotificationCache: Send + Sync {
    fn load_scripts(&self) -> impl Future<Output = CacheResult<()>> + Send;

    fn get_active_time(
        &self,
        project_id: &str,
    ) -> impl Future<Output = CacheResult<Option<DateTime<Utc>>>> + Send;

    /// True only when all four component keys are present.
    fn get_feed_exists(&self, project_id: &str) -> impl Future<Output = CacheResult<bool>> + Send;

    /// Rendered feed. A hit counts one view for the project.
    fn get_feed_data(
        &self,
        project_id: &str,
    ) -> impl Future<Output = CacheResult<Option<String>>> + Send;

    /// Replace the whole feed: active time, views reset to 0, click counters
    /// seeded at 0 for `ids`, rendered data. All four share `ttl`.
    fn update_feed(
        &self,
        project_id: &str,
        ids: &[i64],
        data: &str,
        active_time: DateTime<Utc>,
        ttl: Duration,
    ) -> impl Future<Output = CacheResult<()>> + Send;

    /// Refresh the TTL of all four components together.
    fn set_ttl(&self, project_id: &str, ttl: Duration) -> impl Future<Output = CacheResult<()>> + Send;

    /// Remove all four components.
    fn delete_feed(&self, project_id: &str) -> impl Future<Output = CacheResult<()>> + Send;

    /// Views since the last drain; the read resets the counter.
    fn get_views(&self, project_id: &str) -> impl Future<Output = CacheResult<i64>> + Send;

    /// Click counters of the active notifications; the read does not reset.
    fn get_clicks(
        &self,
        project_id: &str,
    ) -> impl Future<Output = CacheResult<BTreeMap<i64, i64>>> + Send;

    /// Count a click only if `notification_id` is in the project's counter map.
    fn incr_click(
        &self,
        project_id: &str,
        notification_id: i64,
    ) -> impl Future<Output = CacheResult<bool>> + Send;

    fn health_check(&self) -> impl Future<Output = CacheResult<bool>> + Send;

    fn provider_name(&self) -> &'static str;
}
