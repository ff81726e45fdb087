//! Request-path feed reads against a reconciled in-process cache.

mod common;

use beacon_core::cache::NotificationCache;
use beacon_core::services::FeedLookup;
use chrono::{Duration as ChronoDuration, Utc};
use common::{Harness, NotificationBuilder};

#[tokio::test]
async fn test_feed_lists_active_notifications_in_id_order() {
    let h = Harness::new();
    let now = Utc::now();
    NotificationBuilder::new(9, "p1", now).insert(&h.store);
    NotificationBuilder::new(3, "p1", now).insert(&h.store);
    NotificationBuilder::new(4, "p1", now)
        .scheduled_in(300)
        .insert(&h.store);
    NotificationBuilder::new(7, "p2", now).insert(&h.store);
    h.reconciler.run_cycle(now).await;

    let FeedLookup::Found(feed) = h.feeds.get_feed("p1", None).await.unwrap() else {
        panic!("expected a feed for p1");
    };
    let items: Vec<serde_json::Value> = serde_json::from_str(feed.notifications.get()).unwrap();
    let ids: Vec<i64> = items.iter().map(|item| item["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![3, 9]);
    assert_eq!(feed.time, now);
}

#[tokio::test]
async fn test_client_with_current_copy_gets_not_modified() {
    let h = Harness::new();
    let now = Utc::now();
    NotificationBuilder::new(1, "p1", now).insert(&h.store);
    h.reconciler.run_cycle(now).await;

    let stale_copy = now - ChronoDuration::seconds(30);
    assert!(matches!(
        h.feeds.get_feed("p1", Some(stale_copy)).await.unwrap(),
        FeedLookup::Found(_)
    ));
    assert!(matches!(
        h.feeds.get_feed("p1", Some(now)).await.unwrap(),
        FeedLookup::NotModified
    ));
    assert_eq!(h.notifications.get_views("p1").await.unwrap(), 1);
}

#[tokio::test]
async fn test_cold_cache_is_served_from_store_then_cached() {
    let h = Harness::new();
    let now = Utc::now();
    NotificationBuilder::new(1, "p1", now).insert(&h.store);

    assert!(!h.notifications.get_feed_exists("p1").await.unwrap());
    assert!(matches!(
        h.feeds.get_feed("p1", None).await.unwrap(),
        FeedLookup::Found(_)
    ));
    assert!(h.notifications.get_feed_exists("p1").await.unwrap());

    // The reconciler still owns the modified flag and clears it on its pass.
    let report = h.reconciler.run_cycle(Utc::now()).await;
    assert_eq!(report.feeds_rendered, 1);
    assert!(!h.store.notification(1).unwrap().modified);
}

#[tokio::test]
async fn test_unknown_project_is_not_found() {
    let h = Harness::new();
    let err = h.feeds.get_feed("nobody", None).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!h.feeds.record_click("nobody", 1).await.unwrap());
}
