//! Cache client abstraction
//!
//! The harness only talks to a cache region through [`CacheClient`]. The
//! real client (connection setup, region lookup, wire protocol) lives outside
//! this crate; [`memory::MemoryRegion`] is an in-process region used for
//! smoke runs and tests.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryRegion;

/// Value handed to a put. Shared so a stage can dispatch thousands of puts
/// of the same payload without copying it.
pub type Payload = Arc<Value>;

/// Error reported by the cache client for a single operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct ClientError {
    /// Exception class name as reported by the client
    pub name: String,
    /// Human readable message
    pub message: String,
}

impl ClientError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Completion callback for an asynchronous put. Carries the error, if any.
pub type PutCallback = Box<dyn FnOnce(std::result::Result<(), ClientError>) + Send + 'static>;

/// Narrow interface to a cache region
pub trait CacheClient: Send + Sync {
    /// Store `value` under `key`, returning once the client reports the put done.
    ///
    /// Blocks the calling thread. Async callers go through the blocking pool.
    fn put(&self, key: &str, value: &Value) -> std::result::Result<(), ClientError>;

    /// Store `value` under `key` without waiting.
    ///
    /// Returns immediately. `callback` is invoked once the put completes and
    /// may run on any thread. Overlapping in-flight puts are allowed.
    fn put_with_callback(&self, key: String, value: Payload, callback: PutCallback);

    /// Fetch the value stored under `key`
    fn get(&self, key: &str) -> std::result::Result<Option<Value>, ClientError>;

    /// Remove every entry from the region
    fn clear(&self) -> std::result::Result<(), ClientError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::new("CacheServerException", "region destroyed");
        assert_eq!(err.to_string(), "CacheServerException: region destroyed");
    }
}
