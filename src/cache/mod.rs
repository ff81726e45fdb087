//! Cache layer
//!
//! Two cached projections share one key-value backend:
//!
//! - [`RemoteConfigCache`]: `(version, data)` per project with a version-gated
//!   write and sliding TTL.
//! - [`NotificationCache`]: the rendered feed of a project together with its
//!   active time and view/click counters, written and expired as one unit.
//!
//! Providers live in [`providers`]: Redis for deployments, in-process maps for
//! single-process setups and tests.

pub mod errors;
pub mod keys;
pub mod providers;
pub mod scripts;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use keys::CacheKeys;
pub use providers::{
    MemoryNotificationCache, MemoryRemoteConfigCache, RedisNotificationCache,
    RedisRemoteConfigCache,
};
pub use scripts::ScriptRegistry;
pub use traits::{NotificationCache, RemoteConfigCache, UpdateOutcome};
