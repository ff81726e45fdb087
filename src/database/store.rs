//! Durable store seams used by the reconciler and the request-path services.
//!
//! [`PgStore`](super::PgStore) implements both traits over PostgreSQL and
//! [`MemoryStore`](super::MemoryStore) in process.

use crate::error::BeaconResult;
use crate::models::{ConfigEntry, ConfigVersion, FeedSnapshot, RowRevision};
use chrono::{DateTime, Utc};
use std::future::Future;

/// One notification's share of a click drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickFold {
    pub notification_id: i64,
    /// Added to `clicks_count`
    pub delta: i64,
    /// New `clicks_synced` baseline
    pub synced: i64,
}

pub trait NotificationStore: Send + Sync {
    /// SCHEDULED rows whose `schedule_time <= now` become ACTIVE at `now`.
    fn promote_scheduled(&self, now: DateTime<Utc>) -> impl Future<Output = BeaconResult<u64>> + Send;

    /// ACTIVE or SCHEDULED rows whose `expire_time <= now` become FINISHED.
    fn expire_due(&self, now: DateTime<Utc>) -> impl Future<Output = BeaconResult<u64>> + Send;

    /// Projects with at least one ACTIVE row.
    fn active_project_ids(&self) -> impl Future<Output = BeaconResult<Vec<String>>> + Send;

    /// Projects with at least one row flagged modified.
    fn modified_project_ids(&self) -> impl Future<Output = BeaconResult<Vec<String>>> + Send;

    /// Add `views` to every ACTIVE row of the project.
    fn add_views(&self, project_id: &str, views: i64) -> impl Future<Output = BeaconResult<u64>> + Send;

    /// `(id, clicks_synced)` of the project's ACTIVE rows.
    fn click_baselines(
        &self,
        project_id: &str,
    ) -> impl Future<Output = BeaconResult<Vec<(i64, i64)>>> + Send;

    /// Apply all folds of one project atomically.
    fn apply_clicks(
        &self,
        project_id: &str,
        folds: &[ClickFold],
    ) -> impl Future<Output = BeaconResult<u64>> + Send;

    /// Consistent view of everything a feed render needs.
    fn feed_snapshot(&self, project_id: &str) -> impl Future<Output = BeaconResult<FeedSnapshot>> + Send;

    /// After a render was cached: clear the modified flags seen in the
    /// snapshot and reset `clicks_synced` of the rendered rows, in one
    /// transaction. A flag is cleared only while the row still holds the
    /// observed revision.
    fn mark_rendered(
        &self,
        project_id: &str,
        modified: &[RowRevision],
        rendered_ids: &[i64],
    ) -> impl Future<Output = BeaconResult<()>> + Send;
}

pub trait RemoteConfigStore: Send + Sync {
    fn list_versions(&self) -> impl Future<Output = BeaconResult<Vec<ConfigVersion>>> + Send;

    fn get(&self, project_id: &str) -> impl Future<Output = BeaconResult<Option<ConfigEntry>>> + Send;

    /// Replace the blob, bump the version by one and flag the row modified.
    fn write(&self, project_id: &str, data: &str) -> impl Future<Output = BeaconResult<ConfigEntry>> + Send;

    /// Clear `modified` only if the row still holds `version`.
    fn clear_modified(
        &self,
        project_id: &str,
        version: i64,
    ) -> impl Future<Output = BeaconResult<bool>> + Send;
}
