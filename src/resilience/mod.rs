//! # Resilience Module
//!
//! Every store and cache call made by the reconciler and the request-path
//! services runs under a per-call deadline. A call that overruns fails with
//! [`BeaconError::Timeout`] and only the step that issued it is abandoned.
//!
//! ```rust,no_run
//! use beacon_core::resilience::with_deadline;
//! use std::time::Duration;
//!
//! # async fn example() -> beacon_core::BeaconResult<()> {
//! let views = with_deadline(Duration::from_secs(5), "get_views", async {
//!     Ok::<i64, beacon_core::BeaconError>(0)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{BeaconError, BeaconResult};
use std::future::Future;
use std::time::Duration;

/// Run `fut` with a deadline, mapping an overrun to [`BeaconError::Timeout`]
pub async fn with_deadline<T, E, F>(timeout: Duration, operation: &str, fut: F) -> BeaconResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<BeaconError>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(BeaconError::Timeout(format!(
            "{operation} exceeded {}ms",
            timeout.as_millis()
        ))),
    }
}
