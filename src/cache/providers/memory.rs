//! In-process cache providers
//!
//! Each project's state is one struct in a `DashMap`; every operation runs
//! under the shard lock of that entry, so the compare-and-write of the
//! version gate and the membership check of the click counter are atomic
//! without server-side scripts. Expiry is evaluated lazily on access using
//! `tokio::time::Instant`, which also makes TTL behaviour testable with a
//! paused clock.
//!
//! **Important**: This cache is NOT distributed. Use it when the reconciler
//! and the request handlers share one process.

use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::traits::{NotificationCache, RemoteConfigCache, UpdateOutcome};
use crate::models::ConfigEntry;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct ConfigSlot {
    version: i64,
    data: String,
    expires_at: Instant,
}

/// In-process versioned blob cache with sliding TTL.
#[derive(Debug, Clone)]
pub struct MemoryRemoteConfigCache {
    entries: Arc<DashMap<String, ConfigSlot>>,
    data_ttl: Duration,
}

impl MemoryRemoteConfigCache {
    pub fn new(data_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            data_ttl,
        }
    }

    /// Read a live entry and slide its TTL. Expired entries are purged.
    fn read<T>(&self, project_id: &str, f: impl FnOnce(&ConfigSlot) -> T) -> Option<T> {
        let now = Instant::now();
        let mut expired = false;
        let out = match self.entries.get_mut(project_id) {
            Some(mut slot) if slot.expires_at > now => {
                slot.expires_at = now + self.data_ttl;
                Some(f(&slot))
            }
            Some(_) => {
                expired = true;
                None
            }
            None => None,
        };
        if expired {
            self.entries.remove_if(project_id, |_, slot| slot.expires_at <= now);
        }
        out
    }
}

impl RemoteConfigCache for MemoryRemoteConfigCache {
    async fn load_scripts(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn get_version(&self, project_id: &str) -> CacheResult<Option<i64>> {
        Ok(self.read(project_id, |slot| slot.version))
    }

    async fn get_data(&self, project_id: &str) -> CacheResult<Option<String>> {
        Ok(self.read(project_id, |slot| slot.data.clone()))
    }

    async fn update(&self, entry: &ConfigEntry) -> CacheResult<UpdateOutcome> {
        let now = Instant::now();
        let slot = ConfigSlot {
            version: entry.version,
            data: entry.data.clone(),
            expires_at: now + self.data_ttl,
        };
        let outcome = match self.entries.entry(entry.project_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if current.expires_at > now && entry.version <= current.version {
                    UpdateOutcome::Stale
                } else {
                    occupied.insert(slot);
                    UpdateOutcome::Applied
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                UpdateOutcome::Applied
            }
        };
        debug!(
            project_id = %entry.project_id,
            version = entry.version,
            outcome = ?outcome,
            "Config cache UPDATE (memory)"
        );
        Ok(outcome)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Clone)]
struct FeedSlot {
    active_time: DateTime<Utc>,
    views: i64,
    clicks: BTreeMap<i64, i64>,
    data: String,
    expires_at: Instant,
}

/// In-process notification window cache.
///
/// The four components of a feed live in one struct, so they are always
/// present, refreshed and expired together.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationCache {
    feeds: Arc<DashMap<String, FeedSlot>>,
}

impl MemoryNotificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_mut<T>(&self, project_id: &str, f: impl FnOnce(&mut FeedSlot) -> T) -> Option<T> {
        let now = Instant::now();
        let mut expired = false;
        let out = match self.feeds.get_mut(project_id) {
            Some(mut slot) if slot.expires_at > now => Some(f(&mut slot)),
            Some(_) => {
                expired = true;
                None
            }
            None => None,
        };
        if expired {
            self.feeds.remove_if(project_id, |_, slot| slot.expires_at <= now);
        }
        out
    }
}

fn require_ttl(ttl: Duration) -> CacheResult<()> {
    if ttl.as_secs() == 0 {
        return Err(CacheError::InvalidInput(format!(
            "feed TTL must be at least one second, got {ttl:?}"
        )));
    }
    Ok(())
}

impl NotificationCache for MemoryNotificationCache {
    async fn load_scripts(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn get_active_time(&self, project_id: &str) -> CacheResult<Option<DateTime<Utc>>> {
        Ok(self.live_mut(project_id, |slot| slot.active_time))
    }

    async fn get_feed_exists(&self, project_id: &str) -> CacheResult<bool> {
        Ok(self.live_mut(project_id, |_| ()).is_some())
    }

    async fn get_feed_data(&self, project_id: &str) -> CacheResult<Option<String>> {
        Ok(self.live_mut(project_id, |slot| {
            slot.views += 1;
            slot.data.clone()
        }))
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
        require_ttl(ttl)?;
        let slot = FeedSlot {
            active_time,
            views: 0,
            clicks: ids.iter().map(|id| (*id, 0)).collect(),
            data: data.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.feeds.insert(project_id.to_string(), slot);
        debug!(
            project_id = project_id,
            ids = ids.len(),
            ttl_seconds = ttl.as_secs(),
            "Feed cache UPDATE (memory)"
        );
        Ok(())
    }

    async fn set_ttl(&self, project_id: &str, ttl: Duration) -> CacheResult<()> {
        require_ttl(ttl)?;
        self.live_mut(project_id, |slot| slot.expires_at = Instant::now() + ttl);
        Ok(())
    }

    async fn delete_feed(&self, project_id: &str) -> CacheResult<()> {
        self.feeds.remove(project_id);
        Ok(())
    }

    async fn get_views(&self, project_id: &str) -> CacheResult<i64> {
        Ok(self
            .live_mut(project_id, |slot| std::mem::take(&mut slot.views))
            .unwrap_or(0))
    }

    async fn get_clicks(&self, project_id: &str) -> CacheResult<BTreeMap<i64, i64>> {
        Ok(self
            .live_mut(project_id, |slot| slot.clicks.clone())
            .unwrap_or_default())
    }

    async fn incr_click(&self, project_id: &str, notification_id: i64) -> CacheResult<bool> {
        let applied = self
            .live_mut(project_id, |slot| match slot.clicks.get_mut(&notification_id) {
                Some(count) => {
                    *count += 1;
                    true
                }
                None => false,
            })
            .unwrap_or(false);
        Ok(applied)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
