//! Notification rows as stored in the `notifications` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Lifecycle state of a notification.
///
/// `Scheduled -> Active -> Finished`, with `Active|Scheduled -> Canceled`
/// triggered by writers. Stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Active = 1,
    Scheduled = 2,
    Canceled = 3,
    Finished = 4,
}

impl NotificationStatus {
    /// Rows the reconciler still moves by business time.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Scheduled)
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Scheduled => "scheduled",
            Self::Canceled => "canceled",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    #[sqlx(rename = "pid")]
    pub project_id: String,
    pub status: NotificationStatus,
    pub title: String,
    pub text: String,
    pub image: Option<String>,
    pub icon: Option<String>,
    pub priority: i16,
    pub action: Option<String>,
    pub extra: Option<serde_json::Value>,
    pub views_count: i64,
    pub clicks_count: i64,
    /// Cache click counter value last folded into `clicks_count`
    pub clicks_synced: i64,
    /// Set by every write that changes what the feed would render
    pub modified: bool,
    /// Bumped by every such write
    pub revision: i64,
    pub create_time: DateTime<Utc>,
    pub active_time: Option<DateTime<Utc>>,
    pub expire_time: DateTime<Utc>,
    pub schedule_time: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// A minimal active notification, mostly useful for seeding stores.
    pub fn new_active(
        id: i64,
        project_id: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        now: DateTime<Utc>,
        expire_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id: project_id.into(),
            status: NotificationStatus::Active,
            title: title.into(),
            text: text.into(),
            image: None,
            icon: None,
            priority: 0,
            action: None,
            extra: None,
            views_count: 0,
            clicks_count: 0,
            clicks_synced: 0,
            modified: true,
            revision: 1,
            create_time: now,
            active_time: Some(now),
            expire_time,
            schedule_time: None,
        }
    }

    /// Record a change to rendered content.
    pub fn touch(&mut self) {
        self.modified = true;
        self.revision += 1;
    }

    /// A notification waiting for `schedule_time`.
    pub fn new_scheduled(
        id: i64,
        project_id: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        now: DateTime<Utc>,
        schedule_time: DateTime<Utc>,
        expire_time: DateTime<Utc>,
    ) -> Self {
        Self {
            status: NotificationStatus::Scheduled,
            active_time: None,
            schedule_time: Some(schedule_time),
            ..Self::new_active(id, project_id, title, text, now, expire_time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_live_states() {
        assert!(NotificationStatus::Active.is_live());
        assert!(NotificationStatus::Scheduled.is_live());
        assert!(!NotificationStatus::Canceled.is_live());
        assert!(!NotificationStatus::Finished.is_live());
    }

    #[test]
    fn test_scheduled_constructor_has_no_active_time() {
        let now = Utc::now();
        let record = NotificationRecord::new_scheduled(
            3,
            "p1",
            "Sale",
            "Starts soon",
            now,
            now + Duration::minutes(10),
            now + Duration::hours(1),
        );
        assert_eq!(record.status, NotificationStatus::Scheduled);
        assert!(record.active_time.is_none());
        assert_eq!(record.schedule_time, Some(now + Duration::minutes(10)));
    }
}
