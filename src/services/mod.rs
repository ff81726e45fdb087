//! # Request-Path Services
//!
//! What request handlers call: cache first, durable store on a miss, then an
//! opportunistic cache repopulation.

pub mod notification_feed_service;
pub mod remote_config_service;

pub use notification_feed_service::{FeedLookup, NotificationFeedService};
pub use remote_config_service::RemoteConfigService;
