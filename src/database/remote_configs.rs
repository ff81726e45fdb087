//! PostgreSQL implementation of [`RemoteConfigStore`].

use super::store::RemoteConfigStore;
use super::PgStore;
use crate::error::BeaconResult;
use crate::models::{ConfigEntry, ConfigVersion};

impl RemoteConfigStore for PgStore {
    async fn list_versions(&self) -> BeaconResult<Vec<ConfigVersion>> {
        let versions = sqlx::query_as::<_, ConfigVersion>(
            "SELECT pid, version, modified FROM remote_configs ORDER BY pid",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(versions)
    }

    async fn get(&self, project_id: &str) -> BeaconResult<Option<ConfigEntry>> {
        let entry = sqlx::query_as::<_, ConfigEntry>(
            "SELECT pid, data::TEXT AS data, version FROM remote_configs WHERE pid = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn write(&self, project_id: &str, data: &str) -> BeaconResult<ConfigEntry> {
        let entry = sqlx::query_as::<_, ConfigEntry>(
            "INSERT INTO remote_configs (pid, data, version, modified, update_time) \
             VALUES ($1, $2::JSONB, 1, TRUE, NOW()) \
             ON CONFLICT (pid) DO UPDATE SET \
                 data = EXCLUDED.data, \
                 version = remote_configs.version + 1, \
                 modified = TRUE, \
                 update_time = NOW() \
             RETURNING pid, data::TEXT AS data, version",
        )
        .bind(project_id)
        .bind(data)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn clear_modified(&self, project_id: &str, version: i64) -> BeaconResult<bool> {
        let result = sqlx::query(
            "UPDATE remote_configs SET modified = FALSE \
             WHERE pid = $1 AND version = $2 AND modified",
        )
        .bind(project_id)
        .bind(version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
