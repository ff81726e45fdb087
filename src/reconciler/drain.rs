//! Counter drain: fold cached views and clicks into the durable counters.
//!
//! Views are read-and-reset in the cache and added to every ACTIVE row of the
//! project. Clicks are never reset in the cache; each ACTIVE row keeps the
//! last folded cache value in `clicks_synced` and only the difference is
//! added, so draining an unchanged snapshot twice adds nothing.

use crate::cache::NotificationCache;
use crate::database::{ClickFold, NotificationStore};
use crate::error::BeaconResult;
use crate::resilience::with_deadline;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    pub views: i64,
    pub clicks: i64,
}

/// `(delta, new_baseline)` for one click counter.
///
/// A cached value below the baseline means the counter restarted; nothing is
/// added and the baseline follows the cache.
pub fn click_delta(cached: i64, synced: i64) -> (i64, i64) {
    ((cached - synced).max(0), cached)
}

/// Folds for every ACTIVE row whose cached counter moved since the last drain.
pub fn click_folds(baselines: &[(i64, i64)], snapshot: &BTreeMap<i64, i64>) -> Vec<ClickFold> {
    baselines
        .iter()
        .filter_map(|&(notification_id, synced)| {
            let cached = *snapshot.get(&notification_id)?;
            if cached == synced {
                return None;
            }
            let (delta, synced) = click_delta(cached, synced);
            Some(ClickFold {
                notification_id,
                delta,
                synced,
            })
        })
        .collect()
}

pub async fn drain_project<S, N>(
    store: &S,
    cache: &N,
    project_id: &str,
    timeout: Duration,
) -> BeaconResult<DrainOutcome>
where
    S: NotificationStore,
    N: NotificationCache,
{
    let mut outcome = DrainOutcome::default();

    let views = with_deadline(timeout, "get_views", cache.get_views(project_id)).await?;
    if views > 0 {
        if let Err(e) = with_deadline(timeout, "add_views", store.add_views(project_id, views)).await {
            warn!(project_id = %project_id, views = views, error = %e, "Drained views could not be recorded");
            return Err(e);
        }
        outcome.views = views;
    }

    let snapshot = with_deadline(timeout, "get_clicks", cache.get_clicks(project_id)).await?;
    if snapshot.is_empty() {
        return Ok(outcome);
    }
    let baselines =
        with_deadline(timeout, "click_baselines", store.click_baselines(project_id)).await?;
    let folds = click_folds(&baselines, &snapshot);
    if !folds.is_empty() {
        with_deadline(timeout, "apply_clicks", store.apply_clicks(project_id, &folds)).await?;
        outcome.clicks = folds.iter().map(|f| f.delta).sum();
    }

    debug!(
        project_id = %project_id,
        views = outcome.views,
        clicks = outcome.clicks,
        folds = folds.len(),
        "Counters drained"
    );
    Ok(outcome)
}
