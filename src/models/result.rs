//! Benchmark result data models
//!
//! Contains structures for storing and serializing stage metrics and
//! complete run reports.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bench::payload::PayloadKind;
use crate::bench::stage::StageMode;

/// Throughput metrics for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Number of puts the stage issued
    pub operation_count: u64,
    /// Wall-clock time for the whole batch
    pub elapsed_micros: u64,
    /// Rounded operations per second
    pub ops_per_second: u64,
    /// Rounded microseconds per operation
    pub micros_per_op: u64,
}

impl MetricsReport {
    /// Elapsed time as a `Duration`
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.elapsed_micros)
    }
}

/// Report emitted once a stage has finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Position of the stage in the run (0-based)
    pub index: usize,
    /// Stage label, e.g. "object" or "string"
    pub label: String,
    /// Whether puts were issued synchronously or concurrently
    pub mode: StageMode,
    /// Payload shape written by the stage
    pub payload: PayloadKind,
    /// Measured metrics
    pub metrics: MetricsReport,
    /// When the stage finished
    pub finished_at: DateTime<Utc>,
}

impl StageReport {
    /// Human-readable report line
    pub fn line(&self) -> String {
        format!(
            "({}) {} puts: {} usec/put {} puts/sec",
            self.label,
            self.metrics.operation_count,
            self.metrics.micros_per_op,
            self.metrics.ops_per_second
        )
    }
}

/// Outcome of a complete run, persisted to the results history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the first stage was started
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state
    pub finished_at: DateTime<Utc>,
    /// Key prefix used for the run
    pub key_prefix: String,
    /// Reports of every stage that finished, in order
    pub stages: Vec<StageReport>,
    /// Error that halted the run, if any
    #[serde(default)]
    pub error: Option<String>,
}

impl RunReport {
    /// Whether every stage finished
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Total puts measured across all finished stages
    pub fn total_operations(&self) -> u64 {
        self.stages.iter().map(|s| s.metrics.operation_count).sum()
    }

    /// Total measured time across all finished stages
    pub fn total_elapsed(&self) -> Duration {
        self.stages.iter().map(|s| s.metrics.elapsed()).sum()
    }

    /// One-line summary of the run
    pub fn summary(&self) -> String {
        let status = match &self.error {
            None => "ok".to_string(),
            Some(err) => format!("failed: {}", err),
        };
        format!(
            "{} - {} stages - {} puts in {} - {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.stages.len(),
            self.total_operations(),
            crate::util::units::format_micros(self.total_elapsed().as_micros() as u64),
            status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_stage(index: usize, count: u64, elapsed: u64) -> StageReport {
        StageReport {
            index,
            label: "object".to_string(),
            mode: StageMode::Async,
            payload: PayloadKind::Object,
            metrics: crate::bench::timer::compute_metrics(count, elapsed).unwrap(),
            finished_at: Utc::now(),
        }
    }

    fn create_test_run(error: Option<String>) -> RunReport {
        RunReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            key_prefix: "abcd1234".to_string(),
            stages: vec![create_test_stage(0, 10, 1_000), create_test_stage(1, 100, 9_000)],
            error,
        }
    }

    #[test]
    fn test_stage_line_format() {
        let stage = create_test_stage(0, 100, 50_000);
        assert_eq!(stage.line(), "(object) 100 puts: 500 usec/put 2000 puts/sec");
    }

    #[test]
    fn test_run_totals() {
        let run = create_test_run(None);
        assert!(run.succeeded());
        assert_eq!(run.total_operations(), 110);
        assert_eq!(run.total_elapsed(), Duration::from_micros(10_000));
    }

    #[test]
    fn test_summary_mentions_failure() {
        let run = create_test_run(Some("Operation on key 'x' failed".to_string()));
        assert!(!run.succeeded());
        let summary = run.summary();
        assert!(summary.contains("2 stages"));
        assert!(summary.contains("failed"));
    }

    #[test]
    fn test_run_report_json_round_trip() {
        let run = create_test_run(None);
        let json = serde_json::to_string(&run).expect("serialize");
        let back: RunReport = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.stages, run.stages);
        assert_eq!(back.key_prefix, run.key_prefix);
    }
}
