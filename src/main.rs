use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use cachebench::bench::{smoke_test_blocking, BenchmarkSequencer, ReportSink, StageSpec};
use cachebench::client::{CacheClient, MemoryRegion};
use cachebench::config::persistence::ResultsStorage;
use cachebench::config::BenchConfig;
use cachebench::models::{RunReport, StageReport};
use cachebench::util::{format_micros, format_rate, format_size};
use cachebench::{error, BenchError, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Throughput benchmark for key/value cache clients")]
struct Args {
    /// Configuration file; defaults to the user config location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Built-in stage list to run instead of the configured one
    #[arg(short, long, value_enum)]
    preset: Option<Preset>,

    /// Per-stage timeout, e.g. "30s"
    #[arg(short, long)]
    timeout: Option<String>,

    /// Log filter, e.g. "debug" or "cachebench=trace"; falls back to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Do not append the run to the results history
    #[arg(long)]
    no_save: bool,

    /// Skip the put/get round trip before the run
    #[arg(long)]
    no_smoke: bool,

    /// Print the most recent runs from the results history and exit
    #[arg(long, value_name = "COUNT")]
    history: Option<usize>,

    /// Write the effective configuration to the user config location and exit
    #[arg(long)]
    write_config: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// Object and string stages with concurrent puts
    Async,
    /// Small object stages with blocking puts
    Sync,
}

/// How long shutdown waits for blocking puts a timed-out stage left running
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start async runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(args));
    // A hung client put must not keep the process alive after a timeout
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", error::user_friendly_message(&err));
            ExitCode::from(error::exit_code(&err) as u8)
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let requested = level.and_then(|level| match parse_log_filter(level) {
        Ok(filter) => Some(filter),
        Err(message) => {
            eprintln!("warning: {}", message);
            None
        }
    });
    let filter = requested
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn parse_log_filter(level: &str) -> std::result::Result<EnvFilter, String> {
    EnvFilter::try_new(level)
        .map_err(|e| format!("ignoring invalid --log-level '{}': {}", level, e))
}

fn load_config(args: &Args) -> Result<BenchConfig> {
    let mut config = match (&args.config, args.preset) {
        (Some(path), _) => BenchConfig::load_from(path)?,
        (None, Some(Preset::Async)) => BenchConfig::async_preset(),
        (None, Some(Preset::Sync)) => BenchConfig::sync_preset(),
        (None, None) => BenchConfig::load()?,
    };

    if args.config.is_some() {
        if let Some(preset) = args.preset {
            let stages = match preset {
                Preset::Async => BenchConfig::async_preset().stages,
                Preset::Sync => BenchConfig::sync_preset().stages,
            };
            config = config.with_stages(stages);
        }
    }
    if let Some(timeout) = &args.timeout {
        config = config.with_stage_timeout(timeout.clone());
    }
    if args.no_smoke {
        config = config.with_smoke_test(false);
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    if let Some(count) = args.history {
        return print_history(count);
    }

    let config = load_config(&args)?;
    if args.write_config {
        config.save()?;
        println!(
            "Configuration written to {}",
            BenchConfig::config_file_path()?.display()
        );
        return Ok(());
    }

    let mut region = MemoryRegion::new(config.region.clone())?;
    if let Some((min, max)) = config.latency_range()? {
        region = region.with_latency(min, max);
    }
    let client: Arc<dyn CacheClient> = Arc::new(region);

    if config.clear_region {
        client
            .clear()
            .map_err(|e| BenchError::operation("*", e))?;
    }
    if config.smoke_test {
        smoke_test_blocking(Arc::clone(&client)).await?;
    }

    info!(
        region = %config.region,
        string_payload = %format_size(config.string_payload_len()? as u64),
        stages = config.stages.len(),
        "benchmark configured"
    );

    let mut sequencer = BenchmarkSequencer::from_config(&config, client)?;
    let mut sink = ProgressSink::new(sequencer.stages().len() as u64);
    let outcome = sequencer.run(&mut sink).await?;
    sink.finish();

    let report = sequencer.run_report(&outcome);
    if !args.no_save {
        save_report(&report);
    }
    println!("{}", report.summary());

    outcome.into_result().map(|_| ())
}

fn save_report(report: &RunReport) {
    let saved = ResultsStorage::new().and_then(|storage| storage.append_result(report.clone()));
    if let Err(err) = saved {
        warn!(error = %err, "could not save run to results history");
    }
}

fn print_history(count: usize) -> Result<()> {
    let runs = ResultsStorage::new()?.get_recent_results(count)?;
    if runs.is_empty() {
        println!("No runs recorded yet");
    }
    for run in &runs {
        println!("{}", run.summary());
        for stage in &run.stages {
            println!(
                "  {}  ({} total, {})",
                stage.line(),
                format_micros(stage.metrics.elapsed_micros),
                format_rate(stage.metrics.ops_per_second)
            );
        }
    }
    Ok(())
}

/// Prints stage lines above a progress bar that counts finished stages
struct ProgressSink {
    bar: ProgressBar,
}

impl ProgressSink {
    fn new(stages: u64) -> Self {
        let bar = ProgressBar::new(stages);
        let style = ProgressStyle::with_template("{spinner} stage {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }

    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ReportSink for ProgressSink {
    fn stage_started(&mut self, _index: usize, spec: &StageSpec) {
        self.bar.set_message(format!(
            "{} {} puts ({})",
            spec.operations,
            spec.label(),
            spec.mode.description()
        ));
    }

    fn stage_finished(&mut self, report: &StageReport) {
        self.bar.println(report.line());
        self.bar.inc(1);
    }

    fn run_failed(&mut self, index: usize, error: &BenchError) {
        self.bar.abandon_with_message(format!("stage {} failed: {}", index + 1, error));
    }
}
