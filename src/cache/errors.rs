//! Cache error types

use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to connect to cache backend
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// A stored value could not be decoded into the expected shape
    #[error("Cache bad value: {0}")]
    BadValue(String),

    /// The caller asked for a write the protocol does not allow
    #[error("Cache invalid input: {0}")]
    InvalidInput(String),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    BackendError(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            CacheError::ConnectionError(err.to_string())
        } else {
            CacheError::BackendError(err.to_string())
        }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
