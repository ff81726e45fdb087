#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Beacon Core
//!
//! Cache consistency layer for per-project remote configuration and
//! notification feeds.
//!
//! ## Overview
//!
//! Writers mutate PostgreSQL; readers hit Redis. The [`reconciler`] observes
//! modified flags and version numbers in the store and pushes fresh renders
//! into the cache with TTLs derived by the [`expiry`] policy. Views and clicks
//! land in the cache first and are folded back into the store every cycle.
//!
//! ## Module Organization
//!
//! - [`cache`] - Cache traits, Redis and in-process providers, Lua scripts
//! - [`database`] - Durable store traits, PostgreSQL and in-process stores
//! - [`reconciler`] - The lifecycle reconciliation loop
//! - [`services`] - Request-path read-through services
//! - [`expiry`] - Feed TTL derivation
//! - [`models`] - Store rows and feed projections
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing subscriber setup
//! - [`resilience`] - Per-call deadlines
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beacon_core::cache::{MemoryNotificationCache, NotificationCache};
//! use beacon_core::database::MemoryStore;
//! use beacon_core::expiry::ExpiryPolicy;
//! use beacon_core::services::{FeedLookup, NotificationFeedService};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> beacon_core::BeaconResult<()> {
//! let service = NotificationFeedService::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryNotificationCache::new()),
//!     ExpiryPolicy::default(),
//!     Duration::from_secs(5),
//! );
//! if let FeedLookup::Found(feed) = service.get_feed("p1", None).await? {
//!     println!("{} {}", feed.time, feed.notifications);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test                           # Unit and in-process integration tests
//! cargo test --features test-services  # Also against live Redis and PostgreSQL
//! ```

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod expiry;
pub mod logging;
pub mod models;
pub mod reconciler;
pub mod resilience;
pub mod services;

pub use config::{BeaconConfig, ConfigManager};
pub use error::{BeaconError, BeaconResult};
pub use expiry::{Expiry, ExpiryPolicy};
pub use reconciler::{CycleReport, LifecycleReconciler};
