//! Request-path access to per-project remote configuration.

use crate::cache::{RemoteConfigCache, UpdateOutcome};
use crate::database::RemoteConfigStore;
use crate::error::{BeaconError, BeaconResult};
use crate::models::ConfigEntry;
use crate::resilience::with_deadline;
use serde_json::value::RawValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Read-through cache in front of the remote config store.
///
/// Reads are served from the cache; a miss or a cache failure falls back to
/// the store and repopulates the cache on a best-effort basis.
pub struct RemoteConfigService<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    call_timeout: Duration,
}

impl<S, C> Clone for RemoteConfigService<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            call_timeout: self.call_timeout,
        }
    }
}

impl<S, C> RemoteConfigService<S, C>
where
    S: RemoteConfigStore,
    C: RemoteConfigCache,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, call_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            call_timeout,
        }
    }

    /// The project's config blob.
    pub async fn get_data(&self, project_id: &str) -> BeaconResult<String> {
        match with_deadline(self.call_timeout, "get_config_data", self.cache.get_data(project_id)).await {
            Ok(Some(data)) => return Ok(data),
            Ok(None) => debug!(project_id = %project_id, "Remote config cache miss"),
            Err(e) => warn!(project_id = %project_id, error = %e, "Remote config cache read failed, using store"),
        }

        let entry = with_deadline(self.call_timeout, "get_config", self.store.get(project_id))
            .await?
            .ok_or_else(|| BeaconError::NotFound(format!("remote config for project {project_id}")))?;

        self.repopulate(&entry).await;
        Ok(entry.data)
    }

    /// Store a new blob (bumping its version) and push it to the cache.
    pub async fn write(&self, project_id: &str, data: &str) -> BeaconResult<ConfigEntry> {
        serde_json::from_str::<&RawValue>(data)?;

        let entry = with_deadline(self.call_timeout, "write_config", self.store.write(project_id, data)).await?;
        self.repopulate(&entry).await;
        Ok(entry)
    }

    /// A failed push is left to the reconciler; the row stays flagged modified.
    async fn repopulate(&self, entry: &ConfigEntry) {
        match with_deadline(self.call_timeout, "update_config", self.cache.update(entry)).await {
            Ok(UpdateOutcome::Applied) => {
                debug!(project_id = %entry.project_id, version = entry.version, "Remote config cached");
            }
            Ok(UpdateOutcome::Stale) => {
                debug!(project_id = %entry.project_id, version = entry.version, "Cache already holds a newer remote config");
            }
            Err(e) => {
                warn!(project_id = %entry.project_id, version = entry.version, error = %e, "Remote config cache update failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryRemoteConfigCache;
    use crate::database::MemoryStore;

    fn service() -> (
        RemoteConfigService<MemoryStore, MemoryRemoteConfigCache>,
        MemoryStore,
        MemoryRemoteConfigCache,
    ) {
        let store = MemoryStore::new();
        let cache = MemoryRemoteConfigCache::new(Duration::from_secs(3600));
        let service = RemoteConfigService::new(
            Arc::new(store.clone()),
            Arc::new(cache.clone()),
            Duration::from_secs(5),
        );
        (service, store, cache)
    }

    #[tokio::test]
    async fn test_miss_falls_back_and_repopulates() {
        let (service, store, cache) = service();
        store.insert_config(ConfigEntry::new("p1", 2, r#"{"flag":true}"#), false);

        assert_eq!(service.get_data("p1").await.unwrap(), r#"{"flag":true}"#);
        assert_eq!(cache.get_version("p1").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_unknown_project_is_not_found() {
        let (service, _store, _cache) = service();
        let err = service.get_data("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_write_serves_new_version() {
        let (service, _store, cache) = service();
        service.write("p1", r#"{"v":1}"#).await.unwrap();
        let entry = service.write("p1", r#"{"v":2}"#).await.unwrap();

        assert_eq!(entry.version, 2);
        assert_eq!(cache.get_version("p1").await.unwrap(), Some(2));
        assert_eq!(service.get_data("p1").await.unwrap(), r#"{"v":2}"#);
    }

    #[tokio::test]
    async fn test_write_rejects_invalid_json() {
        let (service, store, _cache) = service();
        let err = service.write("p1", "{not json").await.unwrap_err();
        assert!(matches!(err, BeaconError::SerializationError(_)));
        assert_eq!(store.config_modified("p1"), None);
    }
}
