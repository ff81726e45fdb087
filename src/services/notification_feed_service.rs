//! Request-path access to project notification feeds.

use crate::cache::NotificationCache;
use crate::config::CacheConfig;
use crate::database::NotificationStore;
use crate::error::{BeaconError, BeaconResult};
use crate::expiry::{Expiry, ExpiryPolicy};
use crate::models::{FeedResponse, ProjectFeed};
use crate::resilience::with_deadline;
use chrono::{DateTime, Utc};
use serde_json::value::RawValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a feed read
#[derive(Debug, Clone)]
pub enum FeedLookup {
    Found(FeedResponse),
    /// The caller's copy is at least as new as the feed's active time
    NotModified,
}

pub struct NotificationFeedService<S, N> {
    store: Arc<S>,
    cache: Arc<N>,
    policy: ExpiryPolicy,
    call_timeout: Duration,
    write_invalidation_ttl: Duration,
}

impl<S, N> Clone for NotificationFeedService<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            policy: self.policy,
            call_timeout: self.call_timeout,
            write_invalidation_ttl: self.write_invalidation_ttl,
        }
    }
}

impl<S, N> NotificationFeedService<S, N>
where
    S: NotificationStore,
    N: NotificationCache,
{
    pub fn new(store: Arc<S>, cache: Arc<N>, policy: ExpiryPolicy, call_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            policy,
            call_timeout,
            write_invalidation_ttl: CacheConfig::default().write_invalidation_ttl(),
        }
    }

    /// Lifetime left to a feed after [`expire_soon`](Self::expire_soon).
    pub fn with_write_invalidation_ttl(mut self, ttl: Duration) -> Self {
        self.write_invalidation_ttl = ttl;
        self
    }

    /// The project's feed, or `NotModified` when `since` is not older than
    /// its active time. Projects without a cacheable feed are not found.
    pub async fn get_feed(
        &self,
        project_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> BeaconResult<FeedLookup> {
        // A feed that failed to read may still be live; overwriting it would
        // reset counters the reconciler has not drained yet.
        let repopulate = match self.cached_feed(project_id, since).await {
            Ok(Some(lookup)) => return Ok(lookup),
            Ok(None) => {
                debug!(project_id = %project_id, "Feed cache miss");
                true
            }
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "Feed cache read failed, serving store render uncached");
                false
            }
        };
        self.stored_feed(project_id, since, Utc::now(), repopulate).await
    }

    /// Called after a writer inserted, edited or canceled one of the
    /// project's notifications: the cached feed lives at most the write
    /// invalidation TTL longer, so readers see the change before the
    /// reconciler's next render at the latest.
    pub async fn expire_soon(&self, project_id: &str) -> BeaconResult<()> {
        with_deadline(
            self.call_timeout,
            "set_ttl",
            self.cache.set_ttl(project_id, self.write_invalidation_ttl),
        )
        .await?;
        debug!(
            project_id = %project_id,
            ttl_seconds = self.write_invalidation_ttl.as_secs(),
            "Feed expiry shortened after write"
        );
        Ok(())
    }

    /// Count a click for a notification currently in the project's feed.
    pub async fn record_click(&self, project_id: &str, notification_id: i64) -> BeaconResult<bool> {
        let counted = with_deadline(
            self.call_timeout,
            "incr_click",
            self.cache.incr_click(project_id, notification_id),
        )
        .await?;
        if !counted {
            debug!(project_id = %project_id, notification_id = notification_id, "Click for notification outside the feed dropped");
        }
        Ok(counted)
    }

    async fn cached_feed(
        &self,
        project_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> BeaconResult<Option<FeedLookup>> {
        let Some(time) = with_deadline(
            self.call_timeout,
            "get_active_time",
            self.cache.get_active_time(project_id),
        )
        .await?
        else {
            return Ok(None);
        };
        if since.is_some_and(|since| since >= time) {
            return Ok(Some(FeedLookup::NotModified));
        }

        let Some(data) =
            with_deadline(self.call_timeout, "get_feed_data", self.cache.get_feed_data(project_id)).await?
        else {
            return Ok(None);
        };
        Ok(Some(FeedLookup::Found(FeedResponse {
            time,
            notifications: RawValue::from_string(data)?,
        })))
    }

    async fn stored_feed(
        &self,
        project_id: &str,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        repopulate: bool,
    ) -> BeaconResult<FeedLookup> {
        let snapshot =
            with_deadline(self.call_timeout, "feed_snapshot", self.store.feed_snapshot(project_id)).await?;
        let feed = ProjectFeed::render(&snapshot)?.ok_or_else(|| {
            BeaconError::NotFound(format!("active notifications for project {project_id}"))
        })?;

        if since.is_some_and(|since| since >= feed.active_time) {
            return Ok(FeedLookup::NotModified);
        }

        let ttl = match self.policy.for_feed(&feed, now) {
            Expiry::Ttl(ttl) => ttl,
            Expiry::StaleOnArrival { ttl_seconds } => {
                return Err(BeaconError::StaleOnArrival {
                    project_id: project_id.to_string(),
                    ttl_seconds,
                });
            }
        };

        if repopulate {
            self.repopulate(&feed, ttl).await;
        }
        Ok(FeedLookup::Found(FeedResponse {
            time: feed.active_time,
            notifications: RawValue::from_string(feed.data)?,
        }))
    }

    /// Push a store render into the cache. The reseeded click counters start
    /// at zero, so the rendered rows' baselines are reset with them; modified
    /// flags are left for the reconciler.
    async fn repopulate(&self, feed: &ProjectFeed, ttl: Duration) {
        let pushed = with_deadline(
            self.call_timeout,
            "update_feed",
            self.cache
                .update_feed(&feed.project_id, &feed.ids, &feed.data, feed.active_time, ttl),
        )
        .await;
        if let Err(e) = pushed {
            warn!(project_id = %feed.project_id, error = %e, "Feed cache repopulation failed");
            return;
        }
        if let Err(e) = with_deadline(
            self.call_timeout,
            "mark_rendered",
            self.store.mark_rendered(&feed.project_id, &[], &feed.ids),
        )
        .await
        {
            warn!(project_id = %feed.project_id, error = %e, "Click baseline reset failed");
        }
    }
}
