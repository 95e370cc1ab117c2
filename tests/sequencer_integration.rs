use std::sync::Arc;
use std::time::{Duration, Instant};

use cachebench::bench::{
    smoke_test, BenchmarkSequencer, KeyGenerator, PayloadKind, PayloadProvider, ReportSink,
    RunOutcome, SequencerState, StageSpec,
};
use cachebench::client::{CacheClient, ClientError, MemoryRegion, Payload, PutCallback};
use cachebench::models::StageReport;
use cachebench::BenchError;
use parking_lot::Mutex;
use serde_json::{json, Value};

const PREFIX: &str = "it";

#[derive(Debug, Clone, Copy)]
struct PutRecord {
    counter: u64,
    dispatched: Instant,
    completed: Instant,
}

/// Wraps a region and records when every put was issued and completed
struct RecordingClient {
    inner: MemoryRegion,
    records: Arc<Mutex<Vec<PutRecord>>>,
}

impl RecordingClient {
    fn new() -> Self {
        Self {
            inner: MemoryRegion::new("exampleRegion").unwrap(),
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn counter_of(key: &str) -> u64 {
        key.strip_prefix(PREFIX).unwrap().parse().unwrap()
    }
}

impl CacheClient for RecordingClient {
    fn put(&self, key: &str, value: &Value) -> Result<(), ClientError> {
        let dispatched = Instant::now();
        self.inner.put(key, value)?;
        self.records.lock().push(PutRecord {
            counter: Self::counter_of(key),
            dispatched,
            completed: Instant::now(),
        });
        Ok(())
    }

    fn put_with_callback(&self, key: String, value: Payload, callback: PutCallback) {
        let dispatched = Instant::now();
        let counter = Self::counter_of(&key);
        let records = Arc::clone(&self.records);
        let delay = Duration::from_micros((counter % 7) * 100);
        self.inner.put_with_callback(
            key,
            value,
            Box::new(move |result| {
                std::thread::sleep(delay);
                records.lock().push(PutRecord {
                    counter,
                    dispatched,
                    completed: Instant::now(),
                });
                callback(result);
            }),
        );
    }

    fn get(&self, key: &str) -> Result<Option<Value>, ClientError> {
        self.inner.get(key)
    }
}

#[derive(Default)]
struct TimedSink {
    delivered: Vec<(usize, Instant)>,
    failed: Vec<usize>,
}

impl ReportSink for TimedSink {
    fn stage_finished(&mut self, report: &StageReport) {
        self.delivered.push((report.index, Instant::now()));
    }

    fn run_failed(&mut self, index: usize, _error: &BenchError) {
        self.failed.push(index);
    }
}

fn payloads() -> PayloadProvider {
    PayloadProvider::new(json!({ "name": "widget", "tags": ["a", "b"] }), json!("x".repeat(64)))
}

fn stage_of(counter: u64) -> usize {
    match counter {
        1 => 0,
        2..=11 => 1,
        _ => 2,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stages_never_overlap() {
    let client = Arc::new(RecordingClient::new());
    let records = Arc::clone(&client.records);
    let specs = vec![
        StageSpec::sync_puts(1, PayloadKind::Object),
        StageSpec::sync_puts(10, PayloadKind::Object),
        StageSpec::async_puts(100, PayloadKind::Object),
    ];

    let mut sequencer = BenchmarkSequencer::new(specs, client, payloads())
        .unwrap()
        .with_keys(KeyGenerator::new(PREFIX));
    let mut sink = TimedSink::default();
    let outcome = sequencer.run(&mut sink).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(sequencer.state(), SequencerState::Done);

    let records = records.lock().clone();
    assert_eq!(records.len(), 111);

    for stage in 0..2 {
        let last_completion = records
            .iter()
            .filter(|r| stage_of(r.counter) == stage)
            .map(|r| r.completed)
            .max()
            .unwrap();
        let next_dispatch = records
            .iter()
            .filter(|r| stage_of(r.counter) == stage + 1)
            .map(|r| r.dispatched)
            .min()
            .unwrap();
        let (_, delivered) = sink.delivered[stage];

        assert!(last_completion <= delivered, "stage {} reported early", stage);
        assert!(delivered <= next_dispatch, "stage {} overlapped the next", stage);
    }

    let reports = outcome.reports();
    assert_eq!(
        reports.iter().map(|r| r.metrics.operation_count).collect::<Vec<_>>(),
        vec![1, 10, 100]
    );
    assert!(reports.iter().all(|r| r.line().starts_with("(object) ")));
}

#[tokio::test]
async fn test_failure_returns_partial_reports() {
    let region = Arc::new(MemoryRegion::new("exampleRegion").unwrap().with_failure_at(3));
    let specs = vec![
        StageSpec::async_puts(1, PayloadKind::Object),
        StageSpec::async_puts(10, PayloadKind::String),
        StageSpec::async_puts(100, PayloadKind::String),
    ];

    let mut sequencer = BenchmarkSequencer::new(specs, region.clone(), payloads()).unwrap();
    let mut sink = TimedSink::default();
    let outcome = sequencer.run(&mut sink).await.unwrap();

    match outcome {
        RunOutcome::Failed {
            ref reports,
            failed_stage,
            ref error,
        } => {
            assert_eq!(reports.len(), 1);
            assert_eq!(failed_stage, 1);
            assert!(matches!(error, BenchError::Operation { .. }));
        }
        RunOutcome::Done { .. } => panic!("run should have failed"),
    }
    assert_eq!(sink.failed, vec![1]);
    assert_eq!(region.put_count(), 11);
    assert!(sequencer.run_report(&outcome).error.is_some());
}

#[tokio::test]
async fn test_put_then_get_is_deep_equal() {
    let region = MemoryRegion::new("exampleRegion").unwrap();
    let value = json!({
        "id": 42,
        "nested": { "list": [1, 2, { "deep": true }], "text": "hello" },
        "nothing": null
    });

    region.put("roundtrip", &value).unwrap();
    assert_eq!(region.get("roundtrip").unwrap(), Some(value));

    smoke_test(&region).unwrap();
}
