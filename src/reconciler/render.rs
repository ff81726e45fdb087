//! Feed re-render: rebuild a project's feed from the store and push it.

use crate::cache::NotificationCache;
use crate::database::NotificationStore;
use crate::error::BeaconResult;
use crate::expiry::{Expiry, ExpiryPolicy};
use crate::models::ProjectFeed;
use crate::resilience::with_deadline;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The feed was pushed and the observed modified flags cleared
    Cached { ttl: Duration, notifications: usize },
    /// The project has no ACTIVE rows; its feed was removed
    Deleted,
    /// The feed would already be out of date; nothing was written and the
    /// flags stay set for the next cycle
    StaleOnArrival { ttl_seconds: i64 },
}

pub async fn render_project<S, N>(
    store: &S,
    cache: &N,
    policy: &ExpiryPolicy,
    project_id: &str,
    now: DateTime<Utc>,
    timeout: Duration,
) -> BeaconResult<RenderOutcome>
where
    S: NotificationStore,
    N: NotificationCache,
{
    let snapshot = with_deadline(timeout, "feed_snapshot", store.feed_snapshot(project_id)).await?;

    let Some(feed) = ProjectFeed::render(&snapshot)? else {
        with_deadline(timeout, "delete_feed", cache.delete_feed(project_id)).await?;
        with_deadline(
            timeout,
            "mark_rendered",
            store.mark_rendered(project_id, &snapshot.modified, &[]),
        )
        .await?;
        debug!(project_id = %project_id, "Project has no active notifications, feed removed");
        return Ok(RenderOutcome::Deleted);
    };

    let ttl = match policy.for_feed(&feed, now) {
        Expiry::Ttl(ttl) => ttl,
        Expiry::StaleOnArrival { ttl_seconds } => {
            info!(
                project_id = %project_id,
                ttl_seconds = ttl_seconds,
                earliest_expire = %feed.earliest_expire,
                "Feed stale on arrival, render skipped"
            );
            return Ok(RenderOutcome::StaleOnArrival { ttl_seconds });
        }
    };

    with_deadline(
        timeout,
        "update_feed",
        cache.update_feed(project_id, &feed.ids, &feed.data, feed.active_time, ttl),
    )
    .await?;
    with_deadline(
        timeout,
        "mark_rendered",
        store.mark_rendered(project_id, &snapshot.modified, &feed.ids),
    )
    .await?;

    debug!(
        project_id = %project_id,
        notifications = feed.ids.len(),
        ttl_seconds = ttl.as_secs(),
        "Feed rendered"
    );
    Ok(RenderOutcome::Cached {
        ttl,
        notifications: feed.ids.len(),
    })
}
