//! Reporting sinks
//!
//! The sequencer hands every finished stage to a [`ReportSink`] before the
//! next stage starts.

use crate::bench::stage::StageSpec;
use crate::models::StageReport;
use crate::BenchError;

/// Receives stage reports as a run progresses
pub trait ReportSink: Send {
    /// A stage is about to dispatch its first put
    fn stage_started(&mut self, _index: usize, _spec: &StageSpec) {}

    /// A stage finished and was measured
    fn stage_finished(&mut self, report: &StageReport);

    /// The stage at `index` failed; no further stages will run
    fn run_failed(&mut self, _index: usize, _error: &BenchError) {}
}

/// Prints one line per stage to stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn stage_finished(&mut self, report: &StageReport) {
        println!("{}", report.line());
    }

    fn run_failed(&mut self, index: usize, error: &BenchError) {
        eprintln!("stage {} failed: {}", index + 1, error);
    }
}

/// Collects reports in memory
impl ReportSink for Vec<StageReport> {
    fn stage_finished(&mut self, report: &StageReport) {
        self.push(report.clone());
    }
}
