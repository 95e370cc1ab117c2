//! A single timed batch of puts
//!
//! Synchronous stages issue blocking puts back to back. Asynchronous stages
//! dispatch every put at once and wait for a [`CompletionTracker`] to settle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bench::keys::KeyGenerator;
use crate::bench::payload::PayloadKind;
use crate::bench::timer::{compute_metrics, TimingWindow};
use crate::bench::tracker::{CompletionTracker, Notification};
use crate::client::{CacheClient, Payload};
use crate::models::{MetricsReport, StageReport};
use crate::{BenchError, Result};

/// How a stage issues its puts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageMode {
    /// Blocking puts in a sequential loop
    Sync,
    /// All puts in flight at once, completion tracked
    Async,
}

impl StageMode {
    pub fn description(&self) -> &'static str {
        match self {
            StageMode::Sync => "sync",
            StageMode::Async => "async",
        }
    }
}

/// Description of one stage in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Number of puts to issue
    pub operations: u64,
    /// Payload shape to write
    pub payload: PayloadKind,
    /// Sync or async dispatch
    pub mode: StageMode,
    /// Report label; defaults to the payload name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl StageSpec {
    pub fn new(operations: u64, payload: PayloadKind, mode: StageMode) -> Self {
        Self {
            operations,
            payload,
            mode,
            label: None,
        }
    }

    /// Shorthand for an asynchronous stage
    pub fn async_puts(operations: u64, payload: PayloadKind) -> Self {
        Self::new(operations, payload, StageMode::Async)
    }

    /// Shorthand for a synchronous stage
    pub fn sync_puts(operations: u64, payload: PayloadKind) -> Self {
        Self::new(operations, payload, StageMode::Sync)
    }

    /// Override the report label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label used in reports
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or_else(|| self.payload.label())
    }

    /// Check the stage can be measured
    pub fn validate(&self) -> Result<()> {
        if self.operations == 0 {
            return Err(BenchError::Precondition(format!(
                "stage '{}' must issue at least one put",
                self.label()
            )));
        }
        if self.label().trim().is_empty() {
            return Err(BenchError::Precondition(
                "stage label must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One timed batch of puts against a cache client
pub struct BenchmarkStage {
    index: usize,
    spec: StageSpec,
    payload: Payload,
    client: Arc<dyn CacheClient>,
    keys: KeyGenerator,
    timeout: Option<Duration>,
}

impl BenchmarkStage {
    /// Create a stage; fails if the spec cannot be measured
    pub fn new(
        index: usize,
        spec: StageSpec,
        payload: Payload,
        client: Arc<dyn CacheClient>,
        keys: KeyGenerator,
    ) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            index,
            spec,
            payload,
            client,
            keys,
            timeout: None,
        })
    }

    /// Fail the stage if it has not finished after `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn spec(&self) -> &StageSpec {
        &self.spec
    }

    /// Run the batch and produce its report
    pub async fn run(self) -> Result<StageReport> {
        info!(
            stage = self.index,
            label = self.spec.label(),
            operations = self.spec.operations,
            mode = self.spec.mode.description(),
            "starting stage"
        );

        let metrics = match self.spec.mode {
            StageMode::Sync => self.run_sync().await?,
            StageMode::Async => self.run_async().await?,
        };

        debug!(
            stage = self.index,
            elapsed_us = metrics.elapsed_micros,
            "stage finished"
        );

        Ok(StageReport {
            index: self.index,
            label: self.spec.label().to_string(),
            mode: self.spec.mode,
            payload: self.spec.payload,
            metrics,
            finished_at: Utc::now(),
        })
    }

    /// Blocking puts, one after another, on the blocking pool
    async fn run_sync(&self) -> Result<MetricsReport> {
        let operations = self.spec.operations;
        let client = Arc::clone(&self.client);
        let keys = self.keys.clone();
        let payload = Arc::clone(&self.payload);
        let cancelled = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&cancelled);
        let index = self.index;

        let task = tokio::task::spawn_blocking(move || {
            let mut window = TimingWindow::start();
            for issued in 0..operations {
                if stop.load(Ordering::Acquire) {
                    debug!(stage = index, issued, "sync stage cancelled");
                    return Err(BenchError::Stage(format!(
                        "sync stage cancelled after {} of {} puts",
                        issued, operations
                    )));
                }
                let key = keys.next_key();
                if let Err(err) = client.put(&key, &payload) {
                    return Err(BenchError::operation(key, err));
                }
            }
            let elapsed = window.stop();
            compute_metrics(operations, elapsed)
        });

        let joined = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    // The put in progress cannot be interrupted; stop the loop after it
                    cancelled.store(true, Ordering::Release);
                    return Err(self.timed_out(timeout));
                }
            },
            None => task.await,
        };

        joined.map_err(|e| BenchError::Stage(format!("sync stage task failed: {}", e)))?
    }

    /// Every put dispatched at once; waits for the tracker to settle
    async fn run_async(&self) -> Result<MetricsReport> {
        let operations = self.spec.operations;
        let expected = usize::try_from(operations).map_err(|_| {
            BenchError::Precondition(format!(
                "stage '{}' issues {} puts, more than this platform can track",
                self.spec.label(),
                operations
            ))
        })?;
        let (tracker, settled) = CompletionTracker::channel(expected)?;

        let mut window = TimingWindow::start();
        for _ in 0..operations {
            let key = self.keys.next_key();
            let tracker = Arc::clone(&tracker);
            let failed_key = key.clone();

            self.client.put_with_callback(
                key,
                Arc::clone(&self.payload),
                Box::new(move |result| {
                    let outcome = result.map_err(|e| BenchError::operation(failed_key, e));
                    let note = tracker.notify_one(outcome);
                    debug_assert!(
                        !matches!(note, Notification::Violation(_)),
                        "put callback reported past the batch size"
                    );
                }),
            );
        }
        debug!(stage = self.index, dispatched = operations, "all puts in flight");

        // Callbacks now hold the only references; if the client drops them
        // all unfired, the settle channel closes instead of hanging.
        drop(tracker);

        let outcome = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, settled)
                .await
                .map_err(|_| self.timed_out(timeout))?,
            None => settled.await,
        };

        outcome.map_err(|_| {
            BenchError::Stage(format!(
                "cache client dropped completion callbacks for {} puts before the batch settled",
                operations
            ))
        })??;

        let elapsed = window.stop();
        compute_metrics(operations, elapsed)
    }

    fn timed_out(&self, timeout: Duration) -> BenchError {
        warn!(stage = self.index, ?timeout, "stage timed out");
        BenchError::Timeout {
            label: self.spec.label().to_string(),
            timeout,
        }
    }
}
