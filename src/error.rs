//! Error types for the cache consistency layer.

use crate::cache::CacheError;
use crate::config::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BeaconError {
    /// Durable store has no row for the requested project or notification
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// A store or cache call exceeded its per-call deadline
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
    /// The computed feed lifetime was already over when the render finished
    #[error("Feed for project {project_id} is stale on arrival ({ttl_seconds}s)")]
    StaleOnArrival { project_id: String, ttl_seconds: i64 },
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl BeaconError {
    /// Transient I/O failures are retried on the next cycle or request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BeaconError::DatabaseError(_) | BeaconError::Cache(_) | BeaconError::Timeout(_)
        )
    }

    /// Readers get no feed either way.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BeaconError::NotFound(_) | BeaconError::StaleOnArrival { .. }
        )
    }
}

impl From<sqlx::Error> for BeaconError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => BeaconError::NotFound("row not found".to_string()),
            other => BeaconError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for BeaconError {
    fn from(error: serde_json::Error) -> Self {
        BeaconError::SerializationError(format!("JSON serialization error: {error}"))
    }
}

pub type BeaconResult<T> = Result<T, BeaconError>;
