//! Server-side conditional scripts
//!
//! Every multi-step cache mutation whose correctness depends on a read goes
//! through one of these scripts so the read-compare-write happens in a single
//! round trip. Scripts are registered with `SCRIPT LOAD` at startup and then
//! invoked by SHA (`EVALSHA`); `redis::Script` reloads transparently if the
//! server answers `NOSCRIPT` after a restart.

use crate::cache::errors::CacheResult;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::{debug, info};

/// KEYS[1] version, KEYS[2] data; ARGV[1] candidate version, ARGV[2] data,
/// ARGV[3] TTL seconds. Returns 1 when written, 0 when stale.
pub const VERSION_GATED_SET: &str = r"
local stored = tonumber(redis.call('GET', KEYS[1]))
local candidate = tonumber(ARGV[1])
if stored and candidate <= stored then
  return 0
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
redis.call('SET', KEYS[2], ARGV[2], 'EX', ARGV[3])
return 1
";

/// KEYS[1] click hash; ARGV[1] notification id. Returns 1 when applied.
pub const MEMBERSHIP_GATED_INCR: &str = r"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 1 then
  redis.call('HINCRBY', KEYS[1], ARGV[1], 1)
  return 1
end
return 0
";

/// KEYS[1] views counter. Returns the views read and subtracts them, which
/// keeps the key TTL and any increment landing after the read.
pub const VIEW_DRAIN: &str = r"
local views = tonumber(redis.call('GET', KEYS[1]))
if not views then
  return 0
end
if views ~= 0 then
  redis.call('DECRBY', KEYS[1], views)
end
return views
";

/// KEYS[1] feed data, KEYS[2] views counter. Returns the data (or nil) and
/// counts one view when the counter still exists.
pub const FEED_READ: &str = r"
local data = redis.call('GET', KEYS[1])
if data and redis.call('EXISTS', KEYS[2]) == 1 then
  redis.call('INCR', KEYS[2])
end
return data
";

/// Handles to the registered scripts, shared by the Redis providers.
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    pub version_gated_set: Script,
    pub membership_gated_incr: Script,
    pub view_drain: Script,
    pub feed_read: Script,
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self {
            version_gated_set: Script::new(VERSION_GATED_SET),
            membership_gated_incr: Script::new(MEMBERSHIP_GATED_INCR),
            view_drain: Script::new(VIEW_DRAIN),
            feed_read: Script::new(FEED_READ),
        }
    }

    fn named(&self) -> [(&'static str, &Script); 4] {
        [
            ("version_gated_set", &self.version_gated_set),
            ("membership_gated_incr", &self.membership_gated_incr),
            ("view_drain", &self.view_drain),
            ("feed_read", &self.feed_read),
        ]
    }

    /// Register every script on the server. Called once per process.
    pub async fn load_all(&self, connection: &ConnectionManager) -> CacheResult<()> {
        let mut conn = connection.clone();
        for (name, script) in self.named() {
            let sha: String = script.prepare_invoke().load_async(&mut conn).await?;
            debug!(script = name, sha = %sha, "Cache script loaded");
        }
        info!(count = self.named().len(), "Cache scripts registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_hashes_are_stable_and_distinct() {
        let a = ScriptRegistry::new();
        let b = ScriptRegistry::new();
        assert_eq!(a.version_gated_set.get_hash(), b.version_gated_set.get_hash());

        let mut hashes: Vec<&str> = a.named().iter().map(|(_, s)| s.get_hash()).collect();
        hashes.sort_unstable();
        hashes.dedup();
        assert_eq!(hashes.len(), 4);
    }

    #[test]
    fn test_version_gate_compares_before_writing() {
        let compare = VERSION_GATED_SET.find("candidate <= stored").unwrap();
        let write = VERSION_GATED_SET.find("redis.call('SET'").unwrap();
        assert!(compare < write);
    }
}
