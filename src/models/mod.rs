//! # Data Models
//!
//! Durable rows read by the reconciler and the projections derived from them.

pub mod feed;
pub mod notification;
pub mod remote_config;

pub use feed::{FeedResponse, FeedSnapshot, ProjectFeed, RowRevision};
pub use notification::{NotificationRecord, NotificationStatus};
pub use remote_config::{ConfigEntry, ConfigVersion};
