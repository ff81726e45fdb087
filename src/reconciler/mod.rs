//! # Lifecycle Reconciler
//!
//! Background loop that keeps the caches eventually consistent with the
//! durable store. Each cycle runs, in order:
//!
//! 1. schedule promotion (`SCHEDULED -> ACTIVE` once `schedule_time` passed)
//! 2. expiry (`ACTIVE|SCHEDULED -> FINISHED` once `expire_time` passed)
//! 3. counter drain for every project with an ACTIVE notification
//! 4. feed re-render for modified projects and active projects with no feed
//! 5. remote config propagation
//!
//! Failures are isolated: a failed bulk step is logged and the next step
//! still runs, a failed project is logged and the next project still runs.
//! Every store and cache call has its own deadline.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use beacon_core::cache::{MemoryNotificationCache, MemoryRemoteConfigCache};
//! use beacon_core::config::ReconcilerConfig;
//! use beacon_core::database::MemoryStore;
//! use beacon_core::expiry::ExpiryPolicy;
//! use beacon_core::reconciler::LifecycleReconciler;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let reconciler = LifecycleReconciler::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryNotificationCache::new()),
//!     Arc::new(MemoryRemoteConfigCache::new(Duration::from_secs(86_400))),
//!     ReconcilerConfig::default(),
//!     ExpiryPolicy::default(),
//! );
//! reconciler.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! # }
//! ```

pub mod config_sync;
pub mod drain;
pub mod render;

use crate::cache::{NotificationCache, RemoteConfigCache};
use crate::config::ReconcilerConfig;
use crate::database::{NotificationStore, RemoteConfigStore};
use crate::expiry::ExpiryPolicy;
use crate::logging::log_reconcile_step;
use crate::resilience::with_deadline;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub use config_sync::ConfigSyncReport;
pub use drain::DrainOutcome;
pub use render::RenderOutcome;

/// What one cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub promoted: u64,
    pub expired: u64,
    pub views_drained: i64,
    pub clicks_drained: i64,
    pub feeds_rendered: usize,
    pub feeds_deleted: usize,
    pub renders_skipped: usize,
    pub configs_propagated: usize,
    pub configs_acknowledged: usize,
    /// Failed bulk steps plus failed per-project operations
    pub failures: usize,
    pub duration: Duration,
}

impl CycleReport {
    pub fn has_changes(&self) -> bool {
        self.promoted > 0
            || self.expired > 0
            || self.views_drained > 0
            || self.clicks_drained > 0
            || self.feeds_rendered > 0
            || self.feeds_deleted > 0
            || self.configs_propagated > 0
            || self.configs_acknowledged > 0
    }
}

pub struct LifecycleReconciler<S, N, R> {
    store: Arc<S>,
    notifications: Arc<N>,
    configs: Arc<R>,
    config: ReconcilerConfig,
    policy: ExpiryPolicy,
}

impl<S, N, R> std::fmt::Debug for LifecycleReconciler<S, N, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleReconciler")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<S, N, R> LifecycleReconciler<S, N, R>
where
    S: NotificationStore + RemoteConfigStore,
    N: NotificationCache,
    R: RemoteConfigCache,
{
    pub fn new(
        store: Arc<S>,
        notifications: Arc<N>,
        configs: Arc<R>,
        config: ReconcilerConfig,
        policy: ExpiryPolicy,
    ) -> Self {
        Self {
            store,
            notifications,
            configs,
            config,
            policy,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Run cycles on the configured interval until `shutdown` resolves.
    ///
    /// The first cycle starts immediately. A cycle in progress when shutdown
    /// is requested is abandoned at its next await point.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if !self.config.enabled {
            info!("Reconciler disabled by configuration");
            return;
        }

        let mut interval_timer = interval(self.config.cycle_interval());
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            interval_seconds = self.config.cycle_interval_seconds,
            call_timeout_ms = self.config.call_timeout_ms,
            max_feed_ttl_seconds = self.policy.max_feed_ttl().as_secs(),
            "Starting lifecycle reconciler"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Lifecycle reconciler stopping");
                    return;
                }
                _ = interval_timer.tick() => {
                    tokio::select! {
                        () = &mut shutdown => {
                            info!("Lifecycle reconciler stopping mid-cycle");
                            return;
                        }
                        report = self.run_cycle(Utc::now()) => log_cycle(&report),
                    }
                }
            }
        }
    }

    /// Run one full cycle against business time `now`.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let start = std::time::Instant::now();
        let timeout = self.config.call_timeout();
        let mut report = CycleReport::default();

        match with_deadline(timeout, "promote_scheduled", self.store.promote_scheduled(now)).await {
            Ok(promoted) => {
                report.promoted = promoted;
                log_reconcile_step("promote_scheduled", None, promoted, None);
            }
            Err(e) => {
                error!(error = %e, "Schedule promotion failed");
                report.failures += 1;
            }
        }

        match with_deadline(timeout, "expire_due", self.store.expire_due(now)).await {
            Ok(expired) => {
                report.expired = expired;
                log_reconcile_step("expire_due", None, expired, None);
            }
            Err(e) => {
                error!(error = %e, "Expiry step failed");
                report.failures += 1;
            }
        }

        let active = match with_deadline(timeout, "active_project_ids", self.store.active_project_ids()).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Listing active projects failed");
                report.failures += 1;
                Vec::new()
            }
        };

        self.drain_counters(&active, timeout, &mut report).await;
        self.render_feeds(&active, now, timeout, &mut report).await;

        match config_sync::sync_configs(self.store.as_ref(), self.configs.as_ref(), timeout).await {
            Ok(sync) => {
                report.configs_propagated = sync.propagated;
                report.configs_acknowledged = sync.acknowledged;
                report.failures += sync.failures;
                log_reconcile_step("sync_configs", None, sync.propagated as u64, None);
            }
            Err(e) => {
                error!(error = %e, "Config propagation failed");
                report.failures += 1;
            }
        }

        report.duration = start.elapsed();
        report
    }

    async fn drain_counters(&self, active: &[String], timeout: Duration, report: &mut CycleReport) {
        for project_id in active {
            match drain::drain_project(self.store.as_ref(), self.notifications.as_ref(), project_id, timeout).await {
                Ok(outcome) => {
                    report.views_drained += outcome.views;
                    report.clicks_drained += outcome.clicks;
                }
                Err(e) => {
                    warn!(project_id = %project_id, error = %e, "Counter drain failed");
                    report.failures += 1;
                }
            }
        }
    }

    async fn render_feeds(
        &self,
        active: &[String],
        now: DateTime<Utc>,
        timeout: Duration,
        report: &mut CycleReport,
    ) {
        let mut targets: BTreeSet<String> =
            match with_deadline(timeout, "modified_project_ids", self.store.modified_project_ids()).await {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    error!(error = %e, "Listing modified projects failed");
                    report.failures += 1;
                    BTreeSet::new()
                }
            };

        for project_id in active {
            if targets.contains(project_id) {
                continue;
            }
            match with_deadline(timeout, "get_feed_exists", self.notifications.get_feed_exists(project_id)).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(project_id = %project_id, "Active project has no cached feed");
                    targets.insert(project_id.clone());
                }
                Err(e) => {
                    warn!(project_id = %project_id, error = %e, "Feed existence probe failed");
                    report.failures += 1;
                }
            }
        }

        for project_id in &targets {
            let outcome = render::render_project(
                self.store.as_ref(),
                self.notifications.as_ref(),
                &self.policy,
                project_id,
                now,
                timeout,
            )
            .await;
            match outcome {
                Ok(RenderOutcome::Cached { .. }) => report.feeds_rendered += 1,
                Ok(RenderOutcome::Deleted) => report.feeds_deleted += 1,
                Ok(RenderOutcome::StaleOnArrival { .. }) => report.renders_skipped += 1,
                Err(e) => {
                    warn!(project_id = %project_id, error = %e, "Feed render failed");
                    report.failures += 1;
                }
            }
        }
    }
}

fn log_cycle(report: &CycleReport) {
    let duration_ms = report.duration.as_millis() as u64;
    if report.has_changes() || report.failures > 0 {
        info!(
            promoted = report.promoted,
            expired = report.expired,
            views_drained = report.views_drained,
            clicks_drained = report.clicks_drained,
            feeds_rendered = report.feeds_rendered,
            feeds_deleted = report.feeds_deleted,
            renders_skipped = report.renders_skipped,
            configs_propagated = report.configs_propagated,
            configs_acknowledged = report.configs_acknowledged,
            failures = report.failures,
            duration_ms = duration_ms,
            "Reconcile cycle completed"
        );
    } else {
        debug!(duration_ms = duration_ms, "Reconcile cycle completed with no changes");
    }
}
