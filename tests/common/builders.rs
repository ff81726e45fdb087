//! In-process wiring and notification builders shared by integration tests.

#![allow(dead_code)]

use beacon_core::cache::{MemoryNotificationCache, MemoryRemoteConfigCache};
use beacon_core::config::ReconcilerConfig;
use beacon_core::database::MemoryStore;
use beacon_core::expiry::ExpiryPolicy;
use beacon_core::models::NotificationRecord;
use beacon_core::services::{NotificationFeedService, RemoteConfigService};
use beacon_core::LifecycleReconciler;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

pub const CONFIG_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Store, caches, reconciler and services all sharing the same state.
pub struct Harness {
    pub store: MemoryStore,
    pub notifications: MemoryNotificationCache,
    pub configs: MemoryRemoteConfigCache,
    pub reconciler:
        LifecycleReconciler<MemoryStore, MemoryNotificationCache, MemoryRemoteConfigCache>,
    pub feeds: NotificationFeedService<MemoryStore, MemoryNotificationCache>,
    pub config_service: RemoteConfigService<MemoryStore, MemoryRemoteConfigCache>,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let notifications = MemoryNotificationCache::new();
        let configs = MemoryRemoteConfigCache::new(CONFIG_TTL);
        let policy = ExpiryPolicy::default();

        let reconciler = LifecycleReconciler::new(
            Arc::new(store.clone()),
            Arc::new(notifications.clone()),
            Arc::new(configs.clone()),
            ReconcilerConfig::default(),
            policy,
        );
        let feeds = NotificationFeedService::new(
            Arc::new(store.clone()),
            Arc::new(notifications.clone()),
            policy,
            CALL_TIMEOUT,
        );
        let config_service = RemoteConfigService::new(
            Arc::new(store.clone()),
            Arc::new(configs.clone()),
            CALL_TIMEOUT,
        );

        Self {
            store,
            notifications,
            configs,
            reconciler,
            feeds,
            config_service,
        }
    }
}

/// Builder for notification rows relative to a fixed `now`
pub struct NotificationBuilder {
    id: i64,
    project_id: String,
    now: DateTime<Utc>,
    expires_in: ChronoDuration,
    scheduled_in: Option<ChronoDuration>,
}

impl NotificationBuilder {
    pub fn new(id: i64, project_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            project_id: project_id.to_string(),
            now,
            expires_in: ChronoDuration::minutes(10),
            scheduled_in: None,
        }
    }

    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = ChronoDuration::seconds(seconds);
        self
    }

    pub fn scheduled_in(mut self, seconds: i64) -> Self {
        self.scheduled_in = Some(ChronoDuration::seconds(seconds));
        self
    }

    pub fn build(self) -> NotificationRecord {
        let title = format!("Notification {}", self.id);
        let expire_time = self.now + self.expires_in;
        match self.scheduled_in {
            Some(delay) => NotificationRecord::new_scheduled(
                self.id,
                self.project_id,
                title,
                "body",
                self.now,
                self.now + delay,
                expire_time,
            ),
            None => NotificationRecord::new_active(
                self.id,
                self.project_id,
                title,
                "body",
                self.now,
                expire_time,
            ),
        }
    }

    pub fn insert(self, store: &MemoryStore) {
        store.insert_notification(self.build());
    }
}
