//! PostgreSQL implementation of [`NotificationStore`].

use super::store::{ClickFold, NotificationStore};
use super::PgStore;
use crate::error::BeaconResult;
use crate::models::{FeedSnapshot, NotificationRecord, NotificationStatus, RowRevision};
use chrono::{DateTime, Utc};

const NOTIFICATION_COLUMNS: &str = "id, pid, status, title, text, image, icon, priority, action, \
     extra, views_count, clicks_count, clicks_synced, modified, revision, create_time, active_time, \
     expire_time, schedule_time";

impl NotificationStore for PgStore {
    async fn promote_scheduled(&self, now: DateTime<Utc>) -> BeaconResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $1, active_time = $3, modified = TRUE \
             WHERE status = $2 AND schedule_time <= $3",
        )
        .bind(NotificationStatus::Active)
        .bind(NotificationStatus::Scheduled)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> BeaconResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $1, modified = TRUE \
             WHERE status IN ($2, $3) AND expire_time <= $4",
        )
        .bind(NotificationStatus::Finished)
        .bind(NotificationStatus::Active)
        .bind(NotificationStatus::Scheduled)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn active_project_ids(&self) -> BeaconResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT pid FROM notifications WHERE status = $1 ORDER BY pid",
        )
        .bind(NotificationStatus::Active)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn modified_project_ids(&self) -> BeaconResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT pid FROM notifications WHERE modified ORDER BY pid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn add_views(&self, project_id: &str, views: i64) -> BeaconResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET views_count = views_count + $2 \
             WHERE pid = $1 AND status = $3",
        )
        .bind(project_id)
        .bind(views)
        .bind(NotificationStatus::Active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn click_baselines(&self, project_id: &str) -> BeaconResult<Vec<(i64, i64)>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            "SELECT id, clicks_synced FROM notifications \
             WHERE pid = $1 AND status = $2 ORDER BY id",
        )
        .bind(project_id)
        .bind(NotificationStatus::Active)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn apply_clicks(&self, project_id: &str, folds: &[ClickFold]) -> BeaconResult<u64> {
        if folds.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = folds.iter().map(|f| f.notification_id).collect();
        let deltas: Vec<i64> = folds.iter().map(|f| f.delta).collect();
        let synced: Vec<i64> = folds.iter().map(|f| f.synced).collect();

        let result = sqlx::query(
            "UPDATE notifications AS n \
             SET clicks_count = n.clicks_count + u.delta, clicks_synced = u.synced \
             FROM UNNEST($2::BIGINT[], $3::BIGINT[], $4::BIGINT[]) AS u(id, delta, synced) \
             WHERE n.pid = $1 AND n.id = u.id",
        )
        .bind(project_id)
        .bind(&ids)
        .bind(&deltas)
        .bind(&synced)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn feed_snapshot(&self, project_id: &str) -> BeaconResult<FeedSnapshot> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let active_sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE pid = $1 AND status = $2 ORDER BY id"
        );
        let active = sqlx::query_as::<_, NotificationRecord>(&active_sql)
            .bind(project_id)
            .bind(NotificationStatus::Active)
            .fetch_all(&mut *tx)
            .await?;

        let next_schedule = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MIN(schedule_time) FROM notifications WHERE pid = $1 AND status = $2",
        )
        .bind(project_id)
        .bind(NotificationStatus::Scheduled)
        .fetch_one(&mut *tx)
        .await?;

        let modified = sqlx::query_as::<_, RowRevision>(
            "SELECT id, revision FROM notifications WHERE pid = $1 AND modified ORDER BY id",
        )
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

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
        let mut tx = self.pool.begin().await?;

        if !modified.is_empty() {
            let ids: Vec<i64> = modified.iter().map(|m| m.id).collect();
            let revisions: Vec<i64> = modified.iter().map(|m| m.revision).collect();
            sqlx::query(
                "UPDATE notifications AS n SET modified = FALSE \
                 FROM UNNEST($2::BIGINT[], $3::BIGINT[]) AS u(id, revision) \
                 WHERE n.pid = $1 AND n.id = u.id AND n.revision = u.revision",
            )
            .bind(project_id)
            .bind(&ids)
            .bind(&revisions)
            .execute(&mut *tx)
            .await?;
        }
        if !rendered_ids.is_empty() {
            sqlx::query("UPDATE notifications SET clicks_synced = 0 WHERE pid = $1 AND id = ANY($2)")
                .bind(project_id)
                .bind(rendered_ids)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
