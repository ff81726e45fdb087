//! In-process store used by tests and single-process deployments.
//!
//! All state sits behind one mutex, so each operation is a transaction.

use super::store::{ClickFold, NotificationStore, RemoteConfigStore};
use crate::error::{BeaconError, BeaconResult};
use crate::models::{
    ConfigEntry, ConfigVersion, FeedSnapshot, NotificationRecord, NotificationStatus, RowRevision,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct ConfigRow {
    data: String,
    version: i64,
    modified: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    notifications: BTreeMap<i64, NotificationRecord>,
    configs: BTreeMap<String, ConfigRow>,
    unavailable_projects: HashSet<String>,
}

impl MemoryState {
    fn check_available(&self, project_id: &str) -> BeaconResult<()> {
        if self.unavailable_projects.contains(project_id) {
            return Err(BeaconError::DatabaseError(format!(
                "project {project_id} is unavailable"
            )));
        }
        Ok(())
    }

    fn project_rows(&self, project_id: &str) -> impl Iterator<Item = &NotificationRecord> {
        let project_id = project_id.to_string();
        self.notifications
            .values()
            .filter(move |n| n.project_id == project_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_notification(&self, record: NotificationRecord) {
        self.state.lock().notifications.insert(record.id, record);
    }

    pub fn notification(&self, id: i64) -> Option<NotificationRecord> {
        self.state.lock().notifications.get(&id).cloned()
    }

    /// Apply a writer-side change, flag the row modified and bump its revision.
    pub fn update_notification(&self, id: i64, f: impl FnOnce(&mut NotificationRecord)) -> bool {
        let mut state = self.state.lock();
        match state.notifications.get_mut(&id) {
            Some(record) => {
                f(record);
                record.touch();
                true
            }
            None => false,
        }
    }

    pub fn insert_config(&self, entry: ConfigEntry, modified: bool) {
        self.state.lock().configs.insert(
            entry.project_id,
            ConfigRow {
                data: entry.data,
                version: entry.version,
                modified,
            },
        );
    }

    pub fn config_modified(&self, project_id: &str) -> Option<bool> {
        self.state.lock().configs.get(project_id).map(|row| row.modified)
    }

    /// Make every per-project call for `project_id` fail with a database error.
    pub fn set_unavailable(&self, project_id: &str, unavailable: bool) {
        let mut state = self.state.lock();
        if unavailable {
            state.unavailable_projects.insert(project_id.to_string());
        } else {
            state.unavailable_projects.remove(project_id);
        }
    }
}

impl NotificationStore for MemoryStore {
    async fn promote_scheduled(&self, now: DateTime<Utc>) -> BeaconResult<u64> {
        let mut state = self.state.lock();
        let mut promoted = 0;
        for record in state.notifications.values_mut() {
            let due = record.schedule_time.is_some_and(|t| t <= now);
            if record.status == NotificationStatus::Scheduled && due {
                record.status = NotificationStatus::Active;
                record.active_time = Some(now);
                record.touch();
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> BeaconResult<u64> {
        let mut state = self.state.lock();
        let mut finished = 0;
        for record in state.notifications.values_mut() {
            if record.status.is_live() && record.expire_time <= now {
                record.status = NotificationStatus::Finished;
                record.touch();
                finished += 1;
            }
        }
        Ok(finished)
    }

    async fn active_project_ids(&self) -> BeaconResult<Vec<String>> {
        let state = self.state.lock();
        let ids: BTreeSet<String> = state
            .notifications
            .values()
            .filter(|n| n.status == NotificationStatus::Active)
            .map(|n| n.project_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn modified_project_ids(&self) -> BeaconResult<Vec<String>> {
        let state = self.state.lock();
        let ids: BTreeSet<String> = state
            .notifications
            .values()
            .filter(|n| n.modified)
            .map(|n| n.project_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn add_views(&self, project_id: &str, views: i64) -> BeaconResult<u64> {
        let mut state = self.state.lock();
        state.check_available(project_id)?;
        let mut updated = 0;
        for record in state.notifications.values_mut() {
            if record.project_id == project_id && record.status == NotificationStatus::Active {
                record.views_count += views;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn click_baselines(&self, project_id: &str) -> BeaconResult<Vec<(i64, i64)>> {
        let state = self.state.lock();
        state.check_available(project_id)?;
        Ok(state
            .project_rows(project_id)
            .filter(|n| n.status == NotificationStatus::Active)
            .map(|n| (n.id, n.clicks_synced))
            .collect())
    }

    async fn apply_clicks(&self, project_id: &str, folds: &[ClickFold]) -> BeaconResult<u64> {
        let mut state = self.state.lock();
        state.check_available(project_id)?;
        let mut updated = 0;
        for fold in folds {
            if let Some(record) = state.notifications.get_mut(&fold.notification_id) {
                if record.project_id == project_id {
                    record.clicks_count += fold.delta;
                    record.clicks_synced = fold.synced;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn feed_snapshot(&self, project_id: &str) -> BeaconResult<FeedSnapshot> {
        let state = self.state.lock();
        state.check_available(project_id)?;
        let active = state
            .project_rows(project_id)
            .filter(|n| n.status == NotificationStatus::Active)
            .cloned()
            .collect();
        let next_schedule = state
            .project_rows(project_id)
            .filter(|n| n.status == NotificationStatus::Scheduled)
            .filter_map(|n| n.schedule_time)
            .min();
        let modified = state
            .project_rows(project_id)
            .filter(|n| n.modified)
            .map(|n| RowRevision {
                id: n.id,
                revision: n.revision,
            })
            .collect();
        Ok(FeedSnapshot {
            project_id: project_id.to_string(),
            active,
            next_schedule,
            modified,
        })
    }

    async fn mark_rendered(
        &self,
        project_id: &str,
        modified: &[RowRevision],
        rendered_ids: &[i64],
    ) -> BeaconResult<()> {
        let mut state = self.state.lock();
        state.check_available(project_id)?;
        for record in state.notifications.values_mut() {
            if record.project_id != project_id {
                continue;
            }
            let observed = RowRevision {
                id: record.id,
                revision: record.revision,
            };
            if modified.contains(&observed) {
                record.modified = false;
            }
            if rendered_ids.contains(&record.id) {
                record.clicks_synced = 0;
            }
        }
        Ok(())
    }
}

impl RemoteConfigStore for MemoryStore {
    async fn list_versions(&self) -> BeaconResult<Vec<ConfigVersion>> {
        let state = self.state.lock();
        Ok(state
            .configs
            .iter()
            .map(|(project_id, row)| ConfigVersion {
                project_id: project_id.clone(),
                version: row.version,
                modified: row.modified,
            })
            .collect())
    }

    async fn get(&self, project_id: &str) -> BeaconResult<Option<ConfigEntry>> {
        let state = self.state.lock();
        state.check_available(project_id)?;
        Ok(state
            .configs
            .get(project_id)
            .map(|row| ConfigEntry::new(project_id, row.version, row.data.clone())))
    }

    async fn write(&self, project_id: &str, data: &str) -> BeaconResult<ConfigEntry> {
        let mut state = self.state.lock();
        state.check_available(project_id)?;
        let row = state
            .configs
            .entry(project_id.to_string())
            .and_modify(|row| {
                row.version += 1;
                row.data = data.to_string();
                row.modified = true;
            })
            .or_insert_with(|| ConfigRow {
                data: data.to_string(),
                version: 1,
                modified: true,
            });
        Ok(ConfigEntry::new(project_id, row.version, row.data.clone()))
    }

    async fn clear_modified(&self, project_id: &str, version: i64) -> BeaconResult<bool> {
        let mut state = self.state.lock();
        state.check_available(project_id)?;
        match state.configs.get_mut(project_id) {
            Some(row) if row.version == version && row.modified => {
                row.modified = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
