//! Runs stages strictly one after another
//!
//! Each stage runs on its own task. The driver awaits that task and hands
//! the report to the sink before the next stage dispatches anything, so the
//! puts of two stages never overlap.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::bench::keys::KeyGenerator;
use crate::bench::payload::PayloadProvider;
use crate::bench::report::ReportSink;
use crate::bench::stage::{BenchmarkStage, StageSpec};
use crate::client::CacheClient;
use crate::config::BenchConfig;
use crate::models::{RunReport, StageReport};
use crate::{BenchError, Result};

/// Position of the sequencer in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// Not started
    Idle,
    /// Stage at this index is in progress
    Running(usize),
    /// Every stage finished
    Done,
    /// Stage at this index failed; later stages never ran
    Failed(usize),
}

impl SequencerState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, SequencerState::Done | SequencerState::Failed(_))
    }

    /// Whether moving to `next` is allowed for a run of `stage_count` stages
    pub fn can_advance_to(&self, next: SequencerState, stage_count: usize) -> bool {
        use SequencerState::*;
        match (*self, next) {
            (Idle, Running(0)) => stage_count > 0,
            (Running(i), Running(j)) => j == i + 1 && j < stage_count,
            (Running(i), Done) => i + 1 == stage_count,
            (Running(i), Failed(j)) => i == j,
            _ => false,
        }
    }
}

/// Terminal result of a run
#[derive(Debug)]
pub enum RunOutcome {
    /// All stages finished
    Done { reports: Vec<StageReport> },
    /// A stage failed; reports of the stages before it are kept
    Failed {
        reports: Vec<StageReport>,
        failed_stage: usize,
        error: BenchError,
    },
}

impl RunOutcome {
    /// Reports of the stages that finished, in order
    pub fn reports(&self) -> &[StageReport] {
        match self {
            RunOutcome::Done { reports } | RunOutcome::Failed { reports, .. } => reports,
        }
    }

    /// Error that halted the run
    pub fn error(&self) -> Option<&BenchError> {
        match self {
            RunOutcome::Done { .. } => None,
            RunOutcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Done { .. })
    }

    /// Convert into the finished reports or the halting error
    pub fn into_result(self) -> Result<Vec<StageReport>> {
        match self {
            RunOutcome::Done { reports } => Ok(reports),
            RunOutcome::Failed { error, .. } => Err(error),
        }
    }
}

/// Drives an ordered list of stages against one cache client
pub struct BenchmarkSequencer {
    specs: Vec<StageSpec>,
    client: Arc<dyn CacheClient>,
    payloads: PayloadProvider,
    keys: KeyGenerator,
    timeout: Option<Duration>,
    state: SequencerState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl BenchmarkSequencer {
    /// Create a sequencer; every stage spec is validated up front
    pub fn new(
        specs: Vec<StageSpec>,
        client: Arc<dyn CacheClient>,
        payloads: PayloadProvider,
    ) -> Result<Self> {
        if specs.is_empty() {
            return Err(BenchError::Precondition(
                "a run needs at least one stage".to_string(),
            ));
        }
        for spec in &specs {
            spec.validate()?;
        }

        Ok(Self {
            specs,
            client,
            payloads,
            keys: KeyGenerator::default(),
            timeout: None,
            state: SequencerState::Idle,
            started_at: None,
            finished_at: None,
        })
    }

    /// Build a sequencer from a validated configuration
    pub fn from_config(config: &BenchConfig, client: Arc<dyn CacheClient>) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.stages.clone(), client, config.payload_provider()?)?
            .with_keys(config.key_generator())
            .with_timeout(config.stage_timeout()?))
    }

    /// Use `keys` for every stage of the run
    pub fn with_keys(mut self, keys: KeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    /// Per-stage timeout; `None` waits indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.specs
    }

    pub fn keys(&self) -> &KeyGenerator {
        &self.keys
    }

    fn transition(&mut self, next: SequencerState) {
        debug_assert!(
            self.state.can_advance_to(next, self.specs.len()),
            "invalid sequencer transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Run every stage in order, reporting each to `sink`.
    ///
    /// A sequencer runs once; calling this again is a precondition error.
    pub async fn run(&mut self, sink: &mut dyn ReportSink) -> Result<RunOutcome> {
        if self.state != SequencerState::Idle {
            return Err(BenchError::Precondition(format!(
                "sequencer already ran (state {:?})",
                self.state
            )));
        }

        self.started_at = Some(Utc::now());
        info!(
            stages = self.specs.len(),
            prefix = self.keys.prefix(),
            "starting benchmark run"
        );

        let mut reports = Vec::with_capacity(self.specs.len());
        for index in 0..self.specs.len() {
            self.transition(SequencerState::Running(index));
            sink.stage_started(index, &self.specs[index]);

            match self.run_stage(index).await {
                Ok(report) => {
                    sink.stage_finished(&report);
                    reports.push(report);
                }
                Err(error) => {
                    error!(stage = index, error = %error, "stage failed, halting run");
                    self.transition(SequencerState::Failed(index));
                    self.finished_at = Some(Utc::now());
                    sink.run_failed(index, &error);
                    return Ok(RunOutcome::Failed {
                        reports,
                        failed_stage: index,
                        error,
                    });
                }
            }
        }

        self.transition(SequencerState::Done);
        self.finished_at = Some(Utc::now());
        info!(stages = reports.len(), "benchmark run finished");
        Ok(RunOutcome::Done { reports })
    }

    async fn run_stage(&self, index: usize) -> Result<StageReport> {
        let spec = self.specs[index].clone();
        let payload = self.payloads.get(spec.payload);
        let stage = BenchmarkStage::new(
            index,
            spec,
            payload,
            Arc::clone(&self.client),
            self.keys.clone(),
        )?
        .with_timeout(self.timeout);

        tokio::spawn(stage.run())
            .await
            .map_err(|e| BenchError::Stage(format!("stage {} task failed: {}", index, e)))?
    }

    /// Persistable report of a finished run
    pub fn run_report(&self, outcome: &RunOutcome) -> RunReport {
        let now = Utc::now();
        RunReport {
            started_at: self.started_at.unwrap_or(now),
            finished_at: self.finished_at.unwrap_or(now),
            key_prefix: self.keys.prefix().to_string(),
            stages: outcome.reports().to_vec(),
            error: outcome.error().map(|e| e.to_string()),
        }
    }
}
