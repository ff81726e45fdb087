//! # Database Operations
//!
//! Durable side of the cache consistency layer.
//!
//! ## Key Components
//!
//! - [`connection`] - Pool construction, health check and embedded migrations
//! - [`store`] - [`NotificationStore`] and [`RemoteConfigStore`] seams
//! - [`PgStore`] - PostgreSQL implementation of both seams
//! - [`MemoryStore`] - In-process implementation for tests
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use beacon_core::config::DatabaseConfig;
//! use beacon_core::database::{connection, NotificationStore, PgStore};
//!
//! # async fn example() -> beacon_core::BeaconResult<()> {
//! let pool = connection::connect(&DatabaseConfig::default()).await?;
//! connection::run_migrations(&pool).await?;
//!
//! let store = PgStore::new(pool);
//! let projects = store.active_project_ids().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod memory;
pub mod notifications;
pub mod remote_configs;
pub mod store;

use sqlx::PgPool;

pub use memory::MemoryStore;
pub use store::{ClickFold, NotificationStore, RemoteConfigStore};

/// PostgreSQL-backed store for notifications and remote configs
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
