//! Per-project feed projection.
//!
//! A feed is a pure function of the project's ACTIVE rows plus the soonest
//! SCHEDULED activation. The store hands over a [`FeedSnapshot`];
//! [`ProjectFeed::render`] turns it into what the notification cache holds.

use super::notification::{NotificationRecord, NotificationStatus};
use crate::error::{BeaconError, BeaconResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Store-side input of a feed render.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub project_id: String,
    pub active: Vec<NotificationRecord>,
    /// Earliest `schedule_time` among the project's SCHEDULED rows
    pub next_schedule: Option<DateTime<Utc>>,
    /// The project's rows flagged modified when the snapshot was taken
    pub modified: Vec<RowRevision>,
}

/// A modified row and the revision a render observed.
///
/// Clearing the flag is conditional on the revision still matching, so an
/// edit landing after the snapshot keeps the row flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct RowRevision {
    pub id: i64,
    pub revision: i64,
}

#[derive(Debug, Serialize)]
struct FeedItem<'a> {
    id: i64,
    title: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    priority: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra: Option<&'a serde_json::Value>,
    active_time: DateTime<Utc>,
}

/// Rendered feed ready for the notification cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectFeed {
    pub project_id: String,
    pub active_time: DateTime<Utc>,
    pub ids: Vec<i64>,
    /// JSON array of the active notifications, ordered by id
    pub data: String,
    pub earliest_expire: DateTime<Utc>,
    pub next_schedule: Option<DateTime<Utc>>,
}

impl ProjectFeed {
    /// Render the snapshot. `Ok(None)` when the project has no ACTIVE rows.
    pub fn render(snapshot: &FeedSnapshot) -> BeaconResult<Option<ProjectFeed>> {
        let mut active: Vec<&NotificationRecord> = snapshot
            .active
            .iter()
            .filter(|n| n.status == NotificationStatus::Active)
            .collect();
        if active.is_empty() {
            return Ok(None);
        }
        active.sort_by_key(|n| n.id);

        let mut items = Vec::with_capacity(active.len());
        let mut active_time: Option<DateTime<Utc>> = None;
        let mut earliest_expire: Option<DateTime<Utc>> = None;
        for n in &active {
            let Some(t) = n.active_time else {
                return Err(BeaconError::InvariantViolation(format!(
                    "active notification {} of project {} has no active_time",
                    n.id, snapshot.project_id
                )));
            };
            active_time = Some(active_time.map_or(t, |cur| cur.max(t)));
            earliest_expire = Some(earliest_expire.map_or(n.expire_time, |cur| cur.min(n.expire_time)));
            items.push(FeedItem {
                id: n.id,
                title: &n.title,
                text: &n.text,
                image: n.image.as_deref(),
                icon: n.icon.as_deref(),
                priority: n.priority,
                action: n.action.as_deref(),
                extra: n.extra.as_ref(),
                active_time: t,
            });
        }

        let (Some(active_time), Some(earliest_expire)) = (active_time, earliest_expire) else {
            return Err(BeaconError::InvariantViolation(format!(
                "feed of project {} rendered without notifications",
                snapshot.project_id
            )));
        };

        Ok(Some(ProjectFeed {
            project_id: snapshot.project_id.clone(),
            active_time,
            ids: active.iter().map(|n| n.id).collect(),
            data: serde_json::to_string(&items)?,
            earliest_expire,
            next_schedule: snapshot.next_schedule,
        }))
    }
}

/// What readers receive: the feed's active time and its notifications.
#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub time: DateTime<Utc>,
    pub notifications: Box<serde_json::value::RawValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(active: Vec<NotificationRecord>) -> FeedSnapshot {
        FeedSnapshot {
            project_id: "p1".to_string(),
            active,
            next_schedule: None,
            modified: vec![],
        }
    }

    #[test]
    fn test_render_empty_project_is_none() {
        assert_eq!(ProjectFeed::render(&snapshot(vec![])).unwrap(), None);
    }

    #[test]
    fn test_render_orders_by_id_and_aggregates_times() {
        let now = Utc::now();
        let mut late = NotificationRecord::new_active(9, "p1", "B", "second", now, now + Duration::hours(2));
        late.active_time = Some(now + Duration::seconds(5));
        let early = NotificationRecord::new_active(4, "p1", "A", "first", now, now + Duration::hours(1));

        let feed = ProjectFeed::render(&snapshot(vec![late, early])).unwrap().unwrap();

        assert_eq!(feed.ids, vec![4, 9]);
        assert_eq!(feed.active_time, now + Duration::seconds(5));
        assert_eq!(feed.earliest_expire, now + Duration::hours(1));

        let parsed: serde_json::Value = serde_json::from_str(&feed.data).unwrap();
        assert_eq!(parsed[0]["id"], 4);
        assert_eq!(parsed[1]["title"], "B");
        assert!(parsed[0].get("image").is_none());
    }

    #[test]
    fn test_render_escapes_text() {
        let now = Utc::now();
        let n = NotificationRecord::new_active(1, "p1", "say \"hi\"", "a\\b", now, now + Duration::hours(1));
        let feed = ProjectFeed::render(&snapshot(vec![n])).unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&feed.data).unwrap();
        assert_eq!(parsed[0]["title"], "say \"hi\"");
    }

    #[test]
    fn test_render_without_active_time_is_invariant_violation() {
        let now = Utc::now();
        let mut n = NotificationRecord::new_active(1, "p1", "t", "x", now, now + Duration::hours(1));
        n.active_time = None;
        let err = ProjectFeed::render(&snapshot(vec![n])).unwrap_err();
        assert!(matches!(err, BeaconError::InvariantViolation(_)));
    }

    #[test]
    fn test_render_ignores_non_active_rows() {
        let now = Utc::now();
        let mut finished = NotificationRecord::new_active(2, "p1", "t", "x", now, now);
        finished.status = NotificationStatus::Finished;
        assert_eq!(ProjectFeed::render(&snapshot(vec![finished])).unwrap(), None);
    }
}
