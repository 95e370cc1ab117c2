//! cachebench - cache client throughput benchmark
//!
//! Drives batches of `put` operations against a key/value cache region,
//! synchronously or with completion tracking, and reports per-operation
//! latency and throughput for each stage of a run.

use thiserror::Error;

pub mod bench;
pub mod client;
pub mod config;
pub mod matchers;
pub mod models;
pub mod util;

pub use client::ClientError;

/// Errors produced by a benchmark run
#[derive(Debug, Error)]
pub enum BenchError {
    /// A single put/get against the cache client failed
    #[error("Operation on key '{key}' failed: {source}")]
    Operation {
        key: String,
        #[source]
        source: ClientError,
    },
    /// The cache client reported more completions than operations dispatched
    #[error("Protocol violation: {observed} completions reported for {expected} operations")]
    ProtocolViolation { expected: usize, observed: usize },
    /// A caller handed in an argument the harness cannot measure with
    #[error("Precondition failed: {0}")]
    Precondition(String),
    /// A stage did not finish within the configured timeout
    #[error("Stage '{label}' timed out after {timeout:?}")]
    Timeout {
        label: String,
        timeout: std::time::Duration,
    },
    /// The put/get round trip before the run returned a different value
    #[error("Smoke test failed: {0}")]
    SmokeTest(String),
    /// Configuration validation or parsing error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Results history could not be read or written
    #[error("Results persistence error: {0}")]
    Persistence(String),
    /// Stage task could not be joined
    #[error("Stage error: {0}")]
    Stage(String),
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Build an operation error for `key`
    pub fn operation(key: impl Into<String>, source: ClientError) -> Self {
        BenchError::Operation {
            key: key.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Persistence(format!("JSON serialization error: {}", err))
    }
}

impl From<toml::de::Error> for BenchError {
    fn from(err: toml::de::Error) -> Self {
        BenchError::Config(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for BenchError {
    fn from(err: toml::ser::Error) -> Self {
        BenchError::Config(format!("TOML serialization error: {}", err))
    }
}

/// Result type alias for cachebench operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Error reporting helpers for the command line
pub mod error {
    use super::BenchError;

    /// Convert error to a message suitable for the terminal
    pub fn user_friendly_message(error: &BenchError) -> String {
        match error {
            BenchError::Operation { key, source } => {
                format!(
                    "A put against the cache failed for key '{}' ({}). The run was aborted.",
                    key, source
                )
            }
            BenchError::ProtocolViolation { expected, observed } => format!(
                "The cache client reported {} completions for {} operations. \
                 This is a client bug, not a data error.",
                observed, expected
            ),
            BenchError::Timeout { label, timeout } => format!(
                "Stage '{}' did not finish within {}. Raise the timeout or check the cache.",
                label,
                humantime::format_duration(*timeout)
            ),
            BenchError::Config(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
            BenchError::Persistence(_) => {
                "Failed to save results. Check disk space and permissions.".to_string()
            }
            _ => error.to_string(),
        }
    }

    /// Process exit code for a failed run
    pub fn exit_code(error: &BenchError) -> i32 {
        match error {
            BenchError::Config(_) | BenchError::Precondition(_) => 2,
            BenchError::ProtocolViolation { .. } => 3,
            BenchError::Timeout { .. } => 4,
            _ => 1,
        }
    }
}

// Common types and constants
pub const APP_NAME: &str = "cachebench";
pub const CONFIG_FILE: &str = "cachebench.toml";
pub const RESULTS_FILE: &str = "results.json";
pub const MAX_RESULTS_HISTORY: usize = 100;
pub const SMOKE_KEY: &str = "smoke";
