//! Stage timing and throughput arithmetic

use std::time::{Duration, Instant};

use crate::models::MetricsReport;
use crate::{BenchError, Result};

/// Measurement window around one stage, on the monotonic clock
#[derive(Debug, Clone, Copy)]
pub struct TimingWindow {
    start: Instant,
    end: Option<Instant>,
}

impl TimingWindow {
    /// Open a window at the current instant
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            end: None,
        }
    }

    /// Close the window and return the elapsed microseconds.
    ///
    /// The end instant is recorded once; stopping again returns the same value.
    pub fn stop(&mut self) -> u64 {
        let end = *self.end.get_or_insert_with(Instant::now);
        end.duration_since(self.start).as_micros() as u64
    }

    /// Elapsed microseconds, if the window has been stopped
    pub fn elapsed_micros(&self) -> Option<u64> {
        self.end
            .map(|end| end.duration_since(self.start).as_micros() as u64)
    }

    /// Instant the window was opened
    pub fn started_at(&self) -> Instant {
        self.start
    }

    /// Instant the window was closed
    pub fn ended_at(&self) -> Option<Instant> {
        self.end
    }
}

/// Derive throughput metrics for `operation_count` operations taking
/// `elapsed_micros` in total.
///
/// ```
/// use cachebench::bench::timer::compute_metrics;
///
/// let report = compute_metrics(100, 50_000).unwrap();
/// assert_eq!(report.micros_per_op, 500);
/// assert_eq!(report.ops_per_second, 2_000);
/// ```
pub fn compute_metrics(operation_count: u64, elapsed_micros: u64) -> Result<MetricsReport> {
    if operation_count == 0 {
        return Err(BenchError::Precondition(
            "cannot compute metrics for zero operations".to_string(),
        ));
    }

    // A single fast put can finish inside one clock tick
    let seconds = elapsed_micros.max(1) as f64 / 1_000_000.0;
    let ops_per_second = (operation_count as f64 / seconds).round() as u64;
    let micros_per_op = (elapsed_micros as f64 / operation_count as f64).round() as u64;

    Ok(MetricsReport {
        operation_count,
        elapsed_micros,
        ops_per_second,
        micros_per_op,
    })
}

/// Same as [`compute_metrics`] for a `Duration`
pub fn compute_metrics_for(operation_count: u64, elapsed: Duration) -> Result<MetricsReport> {
    compute_metrics(operation_count, elapsed.as_micros() as u64)
}
