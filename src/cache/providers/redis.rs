//! Redis cache providers
//!
//! Uses `redis::aio::ConnectionManager` for async multiplexed connections
//! with automatic reconnection. Both providers share one connection manager
//! and one [`ScriptRegistry`]; conditional writes go through the registered
//! scripts, multi-key writes through `MULTI`/`EXEC` pipelines.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::keys::CacheKeys;
use crate::cache::scripts::ScriptRegistry;
use crate::cache::traits::{NotificationCache, RemoteConfigCache, UpdateOutcome};
use crate::config::RedisConfig;
use crate::logging::redact_url;
use crate::models::ConfigEntry;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Open a connection manager. Failing here is fatal at startup.
pub async fn connect(config: &RedisConfig) -> CacheResult<ConnectionManager> {
    let client = redis::Client::open(config.url.as_str()).map_err(|e| {
        CacheError::ConnectionError(format!("Failed to create Redis client: {}", e))
    })?;

    let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
        CacheError::ConnectionError(format!("Failed to connect to Redis: {}", e))
    })?;

    debug!(url = %redact_url(&config.url), "Redis cache connected");
    Ok(connection_manager)
}

async fn ping(connection: &ConnectionManager) -> CacheResult<bool> {
    let mut conn = connection.clone();
    let pong: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(|e| CacheError::BackendError(format!("Redis PING failed: {}", e)))?;
    Ok(pong == "PONG")
}

/// Versioned blob cache backed by Redis.
#[derive(Clone)]
pub struct RedisRemoteConfigCache {
    connection_manager: ConnectionManager,
    scripts: Arc<ScriptRegistry>,
    keys: CacheKeys,
    data_ttl: Duration,
}

impl std::fmt::Debug for RedisRemoteConfigCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRemoteConfigCache")
            .field("connection_manager", &"ConnectionManager")
            .field("keys", &self.keys)
            .field("data_ttl", &self.data_ttl)
            .finish()
    }
}

impl RedisRemoteConfigCache {
    pub fn new(
        connection_manager: ConnectionManager,
        scripts: Arc<ScriptRegistry>,
        keys: CacheKeys,
        data_ttl: Duration,
    ) -> Self {
        Self {
            connection_manager,
            scripts,
            keys,
            data_ttl,
        }
    }

    fn ttl_seconds(&self) -> u64 {
        self.data_ttl.as_secs().max(1)
    }

    async fn get_sliding(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        let value: Option<String> = redis::cmd("GETEX")
            .arg(key)
            .arg("EX")
            .arg(self.ttl_seconds())
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis GETEX failed: {}", e)))?;

        if value.is_some() {
            debug!(key = key, "Cache HIT");
        } else {
            debug!(key = key, "Cache MISS");
        }
        Ok(value)
    }
}

impl RemoteConfigCache for RedisRemoteConfigCache {
    async fn load_scripts(&self) -> CacheResult<()> {
        self.scripts.load_all(&self.connection_manager).await
    }

    async fn get_version(&self, project_id: &str) -> CacheResult<Option<i64>> {
        let key = self.keys.config_version(project_id);
        match self.get_sliding(&key).await? {
            Some(raw) => raw.parse::<i64>().map(Some).map_err(|e| {
                CacheError::BadValue(format!("version of project {project_id} is {raw:?}: {e}"))
            }),
            None => Ok(None),
        }
    }

    async fn get_data(&self, project_id: &str) -> CacheResult<Option<String>> {
        self.get_sliding(&self.keys.config_data(project_id)).await
    }

    async fn update(&self, entry: &ConfigEntry) -> CacheResult<UpdateOutcome> {
        let mut conn = self.connection_manager.clone();
        let written: i64 = self
            .scripts
            .version_gated_set
            .key(self.keys.config_version(&entry.project_id))
            .key(self.keys.config_data(&entry.project_id))
            .arg(entry.version)
            .arg(&entry.data)
            .arg(self.ttl_seconds())
            .invoke_async(&mut conn)
            .await?;

        let outcome = if written == 1 {
            UpdateOutcome::Applied
        } else {
            UpdateOutcome::Stale
        };
        debug!(
            project_id = %entry.project_id,
            version = entry.version,
            outcome = ?outcome,
            "Config cache UPDATE"
        );
        Ok(outcome)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        ping(&self.connection_manager).await
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

/// Notification window cache backed by Redis.
#[derive(Clone)]
pub struct RedisNotificationCache {
    connection_manager: ConnectionManager,
    scripts: Arc<ScriptRegistry>,
    keys: CacheKeys,
}

impl std::fmt::Debug for RedisNotificationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisNotificationCache")
            .field("connection_manager", &"ConnectionManager")
            .field("keys", &self.keys)
            .finish()
    }
}

impl RedisNotificationCache {
    pub fn new(
        connection_manager: ConnectionManager,
        scripts: Arc<ScriptRegistry>,
        keys: CacheKeys,
    ) -> Self {
        Self {
            connection_manager,
            scripts,
            keys,
        }
    }
}

fn feed_ttl_seconds(ttl: Duration) -> CacheResult<u64> {
    match ttl.as_secs() {
        0 => Err(CacheError::InvalidInput(format!(
            "feed TTL must be at least one second, got {ttl:?}"
        ))),
        seconds => Ok(seconds),
    }
}

impl NotificationCache for RedisNotificationCache {
    async fn load_scripts(&self) -> CacheResult<()> {
        self.scripts.load_all(&self.connection_manager).await
    }

    async fn get_active_time(&self, project_id: &str) -> CacheResult<Option<DateTime<Utc>>> {
        let mut conn = self.connection_manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.keys.feed_time(project_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis GET failed: {}", e)))?;

        match raw {
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|t| Some(t.with_timezone(&Utc)))
                .map_err(|e| {
                    CacheError::BadValue(format!("active time of project {project_id} is {raw:?}: {e}"))
                }),
            None => Ok(None),
        }
    }

    async fn get_feed_exists(&self, project_id: &str) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let components = self.keys.feed_components(project_id).to_vec();
        let expected = components.len();
        let present: usize = redis::cmd("EXISTS")
            .arg(components)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis EXISTS failed: {}", e)))?;
        Ok(present == expected)
    }

    async fn get_feed_data(&self, project_id: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        let data: Option<String> = self
            .scripts
            .feed_read
            .key(self.keys.feed_data(project_id))
            .key(self.keys.feed_views(project_id))
            .invoke_async(&mut conn)
            .await?;

        if data.is_some() {
            debug!(project_id = project_id, "Feed cache HIT");
        } else {
            debug!(project_id = project_id, "Feed cache MISS");
        }
        Ok(data)
    }

    async fn update_feed(
        &self,
        project_id: &str,
        ids: &[i64],
        data: &str,
        active_time: DateTime<Utc>,
        ttl: Duration,
    ) -> CacheResult<()> {
        if ids.is_empty() {
            return Err(CacheError::InvalidInput(format!(
                "feed of project {project_id} has no notification ids"
            )));
        }
        let ttl_seconds = feed_ttl_seconds(ttl)?;
        let clicks_key = self.keys.feed_clicks(project_id);
        let seeded: Vec<(i64, i64)> = ids.iter().map(|id| (*id, 0)).collect();

        let mut conn = self.connection_manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(self.keys.feed_time(project_id))
            .arg(active_time.to_rfc3339())
            .arg("EX")
            .arg(ttl_seconds)
            .ignore()
            .cmd("SET")
            .arg(self.keys.feed_views(project_id))
            .arg(0)
            .arg("EX")
            .arg(ttl_seconds)
            .ignore()
            .cmd("DEL")
            .arg(&clicks_key)
            .ignore()
            .cmd("HSET")
            .arg(&clicks_key)
            .arg(&seeded)
            .ignore()
            .cmd("EXPIRE")
            .arg(&clicks_key)
            .arg(ttl_seconds)
            .ignore()
            .cmd("SET")
            .arg(self.keys.feed_data(project_id))
            .arg(data)
            .arg("EX")
            .arg(ttl_seconds)
            .ignore();

        let () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis feed MULTI failed: {}", e)))?;

        debug!(
            project_id = project_id,
            ids = ids.len(),
            ttl_seconds = ttl_seconds,
            "Feed cache UPDATE"
        );
        Ok(())
    }

    async fn set_ttl(&self, project_id: &str, ttl: Duration) -> CacheResult<()> {
        let ttl_seconds = feed_ttl_seconds(ttl)?;
        let mut conn = self.connection_manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in self.keys.feed_components(project_id) {
            pipe.cmd("EXPIRE").arg(key).arg(ttl_seconds).ignore();
        }
        let () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis EXPIRE failed: {}", e)))?;
        Ok(())
    }

    async fn delete_feed(&self, project_id: &str) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let components = self.keys.feed_components(project_id);
        let deleted: u64 = redis::cmd("DEL")
            .arg(components.to_vec())
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis DEL failed: {}", e)))?;
        debug!(project_id = project_id, deleted = deleted, "Feed cache DEL");
        Ok(())
    }

    async fn get_views(&self, project_id: &str) -> CacheResult<i64> {
        let mut conn = self.connection_manager.clone();
        let views: i64 = self
            .scripts
            .view_drain
            .key(self.keys.feed_views(project_id))
            .invoke_async(&mut conn)
            .await?;
        Ok(views)
    }

    async fn get_clicks(&self, project_id: &str) -> CacheResult<BTreeMap<i64, i64>> {
        let mut conn = self.connection_manager.clone();
        let raw: HashMap<String, i64> = redis::cmd("HGETALL")
            .arg(self.keys.feed_clicks(project_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendError(format!("Redis HGETALL failed: {}", e)))?;

        raw.into_iter()
            .map(|(id, count)| {
                id.parse::<i64>().map(|id| (id, count)).map_err(|e| {
                    CacheError::BadValue(format!("click id {id:?} of project {project_id}: {e}"))
                })
            })
            .collect()
    }

    async fn incr_click(&self, project_id: &str, notification_id: i64) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let applied: i64 = self
            .scripts
            .membership_gated_incr
            .key(self.keys.feed_clicks(project_id))
            .arg(notification_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(applied == 1)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        ping(&self.connection_manager).await
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_ttl_seconds_rejects_sub_second() {
        assert!(feed_ttl_seconds(Duration::from_millis(999)).is_err());
        assert_eq!(feed_ttl_seconds(Duration::from_secs(60)).unwrap(), 60);
    }

    // Integration tests require a running Redis instance (behind test-services feature)
    #[cfg(feature = "test-services")]
    mod integration {
        use super::*;
        use tracing::warn;

        fn test_redis_config() -> RedisConfig {
            RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                key_prefix: format!("test-{}", uuid::Uuid::new_v4()),
            }
        }

        async fn providers() -> Option<(RedisRemoteConfigCache, RedisNotificationCache)> {
            let config = test_redis_config();
            let manager = match connect(&config).await {
                Ok(manager) => manager,
                Err(e) => {
                    warn!("Skipping Redis test (not available): {}", e);
                    return None;
                }
            };
            let scripts = Arc::new(ScriptRegistry::new());
            let keys = CacheKeys::new(config.key_prefix.clone());
            let rc = RedisRemoteConfigCache::new(
                manager.clone(),
                scripts.clone(),
                keys.clone(),
                Duration::from_secs(60),
            );
            let nc = RedisNotificationCache::new(manager, scripts, keys);
            rc.load_scripts().await.unwrap();
            Some((rc, nc))
        }

        #[tokio::test]
        async fn test_redis_version_gate() {
            let Some((rc, _)) = providers().await else { return };

            let v3 = ConfigEntry::new("p1", 3, r#"{"v":3}"#);
            let v1 = ConfigEntry::new("p1", 1, r#"{"v":1}"#);
            assert_eq!(rc.update(&v3).await.unwrap(), UpdateOutcome::Applied);
            assert_eq!(rc.update(&v1).await.unwrap(), UpdateOutcome::Stale);
            assert_eq!(rc.get_version("p1").await.unwrap(), Some(3));
            assert_eq!(rc.get_data("p1").await.unwrap().as_deref(), Some(r#"{"v":3}"#));
        }

        #[tokio::test]
        async fn test_redis_feed_lifecycle() {
            let Some((_, nc)) = providers().await else { return };
            let now = Utc::now();

            nc.update_feed("p1", &[5], r#"[{"id":5}]"#, now, Duration::from_secs(60))
                .await
                .unwrap();
            assert!(nc.get_feed_exists("p1").await.unwrap());
            assert!(nc.incr_click("p1", 5).await.unwrap());
            assert!(!nc.incr_click("p1", 6).await.unwrap());
            assert_eq!(nc.get_clicks("p1").await.unwrap(), BTreeMap::from([(5, 1)]));

            assert!(nc.get_feed_data("p1").await.unwrap().is_some());
            assert_eq!(nc.get_views("p1").await.unwrap(), 1);
            assert_eq!(nc.get_views("p1").await.unwrap(), 0);

            nc.delete_feed("p1").await.unwrap();
            assert!(!nc.get_feed_exists("p1").await.unwrap());
            assert!(!nc.incr_click("p1", 5).await.unwrap());
        }
    }
}
