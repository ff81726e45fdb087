//! Config propagation: push remote config blobs the cache is behind on.

use crate::cache::{RemoteConfigCache, UpdateOutcome};
use crate::database::RemoteConfigStore;
use crate::error::{BeaconError, BeaconResult};
use crate::models::ConfigVersion;
use crate::resilience::with_deadline;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigSyncReport {
    pub examined: usize,
    pub propagated: usize,
    /// Modified flags cleared because the cache already held the version
    pub acknowledged: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSyncAction {
    UpToDate,
    Propagated { version: i64 },
    Acknowledged { version: i64 },
}

pub async fn sync_configs<S, C>(store: &S, cache: &C, timeout: Duration) -> BeaconResult<ConfigSyncReport>
where
    S: RemoteConfigStore,
    C: RemoteConfigCache,
{
    let versions = with_deadline(timeout, "list_versions", store.list_versions()).await?;
    let mut report = ConfigSyncReport {
        examined: versions.len(),
        ..Default::default()
    };

    for row in &versions {
        match sync_project(store, cache, row, timeout).await {
            Ok(ConfigSyncAction::UpToDate) => {}
            Ok(ConfigSyncAction::Propagated { version }) => {
                debug!(project_id = %row.project_id, version = version, "Remote config propagated");
                report.propagated += 1;
            }
            Ok(ConfigSyncAction::Acknowledged { version }) => {
                debug!(project_id = %row.project_id, version = version, "Remote config already cached");
                report.acknowledged += 1;
            }
            Err(e) => {
                warn!(project_id = %row.project_id, version = row.version, error = %e, "Remote config propagation failed");
                report.failures += 1;
            }
        }
    }
    Ok(report)
}

pub async fn sync_project<S, C>(
    store: &S,
    cache: &C,
    row: &ConfigVersion,
    timeout: Duration,
) -> BeaconResult<ConfigSyncAction>
where
    S: RemoteConfigStore,
    C: RemoteConfigCache,
{
    let project_id = row.project_id.as_str();
    let cached = with_deadline(timeout, "get_version", cache.get_version(project_id)).await?;
    if cached == Some(row.version) && !row.modified {
        return Ok(ConfigSyncAction::UpToDate);
    }

    // The row may have moved on since it was listed; push what is stored now.
    // Writers bump the store before the cache, so a cache version read before
    // this one can never legitimately exceed it.
    let Some(entry) = with_deadline(timeout, "get_config", store.get(project_id)).await? else {
        return Ok(ConfigSyncAction::UpToDate);
    };
    if let Some(cached) = cached.filter(|cached| *cached > entry.version) {
        return Err(ahead_of_store(project_id, cached, entry.version));
    }

    match with_deadline(timeout, "update_config", cache.update(&entry)).await? {
        UpdateOutcome::Applied => {
            with_deadline(
                timeout,
                "clear_modified",
                store.clear_modified(project_id, entry.version),
            )
            .await?;
            Ok(ConfigSyncAction::Propagated {
                version: entry.version,
            })
        }
        UpdateOutcome::Stale => {
            match with_deadline(timeout, "get_version", cache.get_version(project_id)).await? {
                Some(cached) if cached == entry.version => {
                    with_deadline(
                        timeout,
                        "clear_modified",
                        store.clear_modified(project_id, entry.version),
                    )
                    .await?;
                    Ok(ConfigSyncAction::Acknowledged {
                        version: entry.version,
                    })
                }
                // A writer may have pushed a newer version since `entry`
                // was read; only a cache still ahead of the store is wrong.
                Some(cached) if cached > entry.version => {
                    let stored = with_deadline(timeout, "get_config", store.get(project_id))
                        .await?
                        .map_or(0, |current| current.version);
                    if cached > stored {
                        Err(ahead_of_store(project_id, cached, stored))
                    } else {
                        Ok(ConfigSyncAction::UpToDate)
                    }
                }
                // Evicted or overwritten concurrently; retried next cycle.
                _ => Ok(ConfigSyncAction::UpToDate),
            }
        }
    }
}

fn ahead_of_store(project_id: &str, cached: i64, stored: i64) -> BeaconError {
    BeaconError::InvariantViolation(format!(
        "cached config version {cached} of project {project_id} is ahead of stored version {stored}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryRemoteConfigCache;
    use crate::database::MemoryStore;
    use crate::models::ConfigEntry;
    use crate::services::RemoteConfigService;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Lets a writer publish a new version through the service right after
    /// the first blob read.
    struct WriterAfterRead {
        inner: MemoryStore,
        writer: RemoteConfigService<MemoryStore, MemoryRemoteConfigCache>,
        fired: AtomicBool,
    }

    impl RemoteConfigStore for WriterAfterRead {
        async fn list_versions(&self) -> BeaconResult<Vec<ConfigVersion>> {
            self.inner.list_versions().await
        }

        async fn get(&self, project_id: &str) -> BeaconResult<Option<ConfigEntry>> {
            let entry = self.inner.get(project_id).await?;
            if !self.fired.swap(true, Ordering::SeqCst) {
                self.writer.write(project_id, r#"{"theme":"light"}"#).await?;
            }
            Ok(entry)
        }

        async fn write(&self, project_id: &str, data: &str) -> BeaconResult<ConfigEntry> {
            RemoteConfigStore::write(&self.inner, project_id, data).await
        }

        async fn clear_modified(&self, project_id: &str, version: i64) -> BeaconResult<bool> {
            self.inner.clear_modified(project_id, version).await
        }
    }

    fn cache() -> MemoryRemoteConfigCache {
        MemoryRemoteConfigCache::new(Duration::from_secs(86_400))
    }

    #[tokio::test]
    async fn test_modified_config_is_pushed_and_flag_cleared() {
        let store = MemoryStore::new();
        store.insert_config(ConfigEntry::new("p1", 3, r#"{"theme":"dark"}"#), true);
        let cache = cache();

        let report = sync_configs(&store, &cache, TIMEOUT).await.unwrap();

        assert_eq!(report.propagated, 1);
        assert_eq!(cache.get_version("p1").await.unwrap(), Some(3));
        assert_eq!(store.config_modified("p1"), Some(false));
    }

    #[tokio::test]
    async fn test_absent_entry_is_repopulated_without_flag() {
        let store = MemoryStore::new();
        store.insert_config(ConfigEntry::new("p1", 2, "{}"), false);
        let cache = cache();

        let report = sync_configs(&store, &cache, TIMEOUT).await.unwrap();

        assert_eq!(report.propagated, 1);
        assert_eq!(cache.get_data("p1").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_equal_cached_version_acknowledges_flag() {
        let store = MemoryStore::new();
        store.insert_config(ConfigEntry::new("p1", 4, "{}"), true);
        let cache = cache();
        cache.update(&ConfigEntry::new("p1", 4, "{}")).await.unwrap();

        let report = sync_configs(&store, &cache, TIMEOUT).await.unwrap();

        assert_eq!(report.acknowledged, 1);
        assert_eq!(report.propagated, 0);
        assert_eq!(store.config_modified("p1"), Some(false));
    }

    #[tokio::test]
    async fn test_cache_ahead_of_store_is_invariant_violation() {
        let store = MemoryStore::new();
        store.insert_config(ConfigEntry::new("p1", 2, "{}"), true);
        let cache = cache();
        cache.update(&ConfigEntry::new("p1", 9, "{}")).await.unwrap();

        let row = ConfigVersion {
            project_id: "p1".to_string(),
            version: 2,
            modified: true,
        };
        let err = sync_project(&store, &cache, &row, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, BeaconError::InvariantViolation(_)));
        assert_eq!(store.config_modified("p1"), Some(true));

        let report = sync_configs(&store, &cache, TIMEOUT).await.unwrap();
        assert_eq!(report.failures, 1);
    }

    #[tokio::test]
    async fn test_up_to_date_config_is_left_alone() {
        let store = MemoryStore::new();
        store.insert_config(ConfigEntry::new("p1", 1, "{}"), false);
        let cache = cache();
        cache.update(&ConfigEntry::new("p1", 1, "{}")).await.unwrap();

        let report = sync_configs(&store, &cache, TIMEOUT).await.unwrap();
        assert_eq!(report, ConfigSyncReport { examined: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn test_write_after_listing_is_acknowledged_not_violation() {
        let store = MemoryStore::new();
        store.insert_config(ConfigEntry::new("p1", 1, "{}"), false);
        let cache = cache();
        cache.update(&ConfigEntry::new("p1", 1, "{}")).await.unwrap();
        let service = RemoteConfigService::new(
            Arc::new(store.clone()),
            Arc::new(cache.clone()),
            TIMEOUT,
        );

        let listed = store.list_versions().await.unwrap();
        service.write("p1", r#"{"theme":"dark"}"#).await.unwrap();

        let action = sync_project(&store, &cache, &listed[0], TIMEOUT).await.unwrap();
        assert_eq!(action, ConfigSyncAction::Acknowledged { version: 2 });
        assert_eq!(store.config_modified("p1"), Some(false));
    }

    #[tokio::test]
    async fn test_write_racing_propagation_is_not_a_failure() {
        let inner = MemoryStore::new();
        inner.insert_config(ConfigEntry::new("p1", 1, r#"{"theme":"dark"}"#), true);
        let cache = cache();
        let racing = WriterAfterRead {
            inner: inner.clone(),
            writer: RemoteConfigService::new(
                Arc::new(inner.clone()),
                Arc::new(cache.clone()),
                TIMEOUT,
            ),
            fired: AtomicBool::new(false),
        };

        let report = sync_configs(&racing, &cache, TIMEOUT).await.unwrap();

        assert_eq!(report.failures, 0);
        assert_eq!(cache.get_version("p1").await.unwrap(), Some(2));
        assert_eq!(
            cache.get_data("p1").await.unwrap().as_deref(),
            Some(r#"{"theme":"light"}"#)
        );
        // Version 2 is still flagged and gets acknowledged on the next pass.
        assert_eq!(inner.config_modified("p1"), Some(true));
        let report = sync_configs(&inner, &cache, TIMEOUT).await.unwrap();
        assert_eq!(report.acknowledged, 1);
        assert_eq!(inner.config_modified("p1"), Some(false));
    }
}
