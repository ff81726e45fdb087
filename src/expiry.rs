//! # Feed expiry policy
//!
//! A feed must disappear from the cache no later than the moment its content
//! changes by business time: the first active notification expiring or the
//! next scheduled one activating. The TTL handed to the cache is the time left
//! until that boundary, in whole seconds, capped by `max_feed_ttl`.

use crate::models::ProjectFeed;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of the TTL derivation for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Cache the feed for this long
    Ttl(Duration),
    /// The boundary is already reached; the render must not be cached
    StaleOnArrival { ttl_seconds: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    max_feed_ttl: Duration,
}

impl ExpiryPolicy {
    pub fn new(max_feed_ttl: Duration) -> Self {
        Self { max_feed_ttl }
    }

    pub fn max_feed_ttl(&self) -> Duration {
        self.max_feed_ttl
    }

    /// `min(next_schedule, earliest_expire) - now`, truncated to seconds.
    pub fn feed_ttl(
        &self,
        earliest_expire: DateTime<Utc>,
        next_schedule: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Expiry {
        let boundary = match next_schedule {
            Some(schedule) => schedule.min(earliest_expire),
            None => earliest_expire,
        };
        let remaining = (boundary - now).num_seconds();
        if remaining <= 0 {
            return Expiry::StaleOnArrival {
                ttl_seconds: remaining,
            };
        }
        let seconds = (remaining as u64).min(self.max_feed_ttl.as_secs());
        Expiry::Ttl(Duration::from_secs(seconds))
    }

    pub fn for_feed(&self, feed: &ProjectFeed, now: DateTime<Utc>) -> Expiry {
        self.feed_ttl(feed.earliest_expire, feed.next_schedule, now)
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(15 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn policy() -> ExpiryPolicy {
        ExpiryPolicy::new(Duration::from_secs(3600))
    }

    #[test]
    fn test_ttl_until_earliest_expire() {
        let now = Utc::now();
        let expiry = policy().feed_ttl(now + ChronoDuration::seconds(60), None, now);
        assert_eq!(expiry, Expiry::Ttl(Duration::from_secs(60)));
    }

    #[test]
    fn test_upcoming_schedule_shortens_ttl() {
        let now = Utc::now();
        let expiry = policy().feed_ttl(
            now + ChronoDuration::seconds(600),
            Some(now + ChronoDuration::seconds(90)),
            now,
        );
        assert_eq!(expiry, Expiry::Ttl(Duration::from_secs(90)));
    }

    #[test]
    fn test_later_schedule_does_not_extend_ttl() {
        let now = Utc::now();
        let expiry = policy().feed_ttl(
            now + ChronoDuration::seconds(30),
            Some(now + ChronoDuration::seconds(900)),
            now,
        );
        assert_eq!(expiry, Expiry::Ttl(Duration::from_secs(30)));
    }

    #[test]
    fn test_expired_boundary_is_stale_on_arrival() {
        let now = Utc::now();
        let expiry = policy().feed_ttl(now - ChronoDuration::seconds(1), None, now);
        assert_eq!(expiry, Expiry::StaleOnArrival { ttl_seconds: -1 });
    }

    #[test]
    fn test_sub_second_remaining_is_never_cached() {
        let now = Utc::now();
        let expiry = policy().feed_ttl(now + ChronoDuration::milliseconds(400), None, now);
        assert_eq!(expiry, Expiry::StaleOnArrival { ttl_seconds: 0 });
    }

    #[test]
    fn test_ttl_capped_by_max() {
        let now = Utc::now();
        let expiry = ExpiryPolicy::default().feed_ttl(now + ChronoDuration::days(3), None, now);
        assert_eq!(expiry, Expiry::Ttl(Duration::from_secs(900)));
    }
}
