//! Benchmark engine
//!
//! Key generation, payloads, completion tracking, timing, and the stage and
//! sequencer drivers built on them.

pub mod keys;
pub mod payload;
pub mod report;
pub mod sequencer;
pub mod smoke;
pub mod stage;
pub mod timer;
pub mod tracker;

pub use keys::KeyGenerator;
pub use payload::{PayloadKind, PayloadProvider};
pub use report::{ReportSink, StdoutSink};
pub use sequencer::{BenchmarkSequencer, RunOutcome, SequencerState};
pub use smoke::{smoke_test, smoke_test_blocking};
pub use stage::{BenchmarkStage, StageMode, StageSpec};
pub use timer::{compute_metrics, TimingWindow};
pub use tracker::{CompletionTracker, Notification};
