//! Cache provider implementations

pub mod memory;
pub mod redis;

pub use self::memory::{MemoryNotificationCache, MemoryRemoteConfigCache};
pub use self::redis::{connect, RedisNotificationCache, RedisRemoteConfigCache};
