//! Configuration management module
//!
//! Handles loading, saving, and validation of the benchmark run
//! configuration: the ordered stage list, key and payload settings, and the
//! optional stage timeout.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use byte_unit::Byte;
use serde::{Deserialize, Serialize};

use crate::bench::keys::{KeyGenerator, DEFAULT_PREFIX_LEN};
use crate::bench::payload::{PayloadKind, PayloadProvider};
use crate::bench::stage::StageSpec;
use crate::{BenchError, Result, APP_NAME, CONFIG_FILE};

pub mod persistence;

/// Largest string payload a run may configure
const MAX_STRING_PAYLOAD: u64 = 64 * 1024 * 1024;

/// Benchmark run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Name of the cache region to write to
    pub region: String,
    /// Fixed key prefix; a random one is generated when unset
    pub key_prefix: Option<String>,
    /// Length of the generated key prefix
    pub key_prefix_len: usize,
    /// Size of the random string payload, e.g. "15 KiB"
    pub string_payload_size: String,
    /// JSON file holding the object payload; a random record is used when unset
    pub object_payload: Option<PathBuf>,
    /// Per-stage timeout, e.g. "30s"; stages wait forever when unset
    pub stage_timeout: Option<String>,
    /// Run the put/get round trip before benchmarking
    pub smoke_test: bool,
    /// Clear the region before the first stage
    pub clear_region: bool,
    /// Simulated latency for the in-memory region
    pub latency: Option<LatencyConfig>,
    /// Stages to run, in order
    pub stages: Vec<StageSpec>,
}

/// Simulated per-put latency range for the in-memory region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Shortest delay, e.g. "50us"
    pub min: String,
    /// Longest delay, e.g. "2ms"
    pub max: String,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::async_preset()
    }
}

impl BenchConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    fn base(stages: Vec<StageSpec>) -> Self {
        Self {
            region: "exampleRegion".to_string(),
            key_prefix: None,
            key_prefix_len: DEFAULT_PREFIX_LEN,
            string_payload_size: "15 KiB".to_string(),
            object_payload: None,
            stage_timeout: None,
            smoke_test: true,
            clear_region: true,
            latency: None,
            stages,
        }
    }

    /// Objects at 1, 10 and 100 puts, then strings at 100, 1000 and 10000,
    /// all dispatched asynchronously
    pub fn async_preset() -> Self {
        Self::base(vec![
            StageSpec::async_puts(1, PayloadKind::Object),
            StageSpec::async_puts(10, PayloadKind::Object),
            StageSpec::async_puts(100, PayloadKind::Object),
            StageSpec::async_puts(100, PayloadKind::String),
            StageSpec::async_puts(1000, PayloadKind::String),
            StageSpec::async_puts(10000, PayloadKind::String),
        ])
    }

    /// Objects at 1 and 10 blocking puts
    pub fn sync_preset() -> Self {
        Self::base(vec![
            StageSpec::sync_puts(1, PayloadKind::Object),
            StageSpec::sync_puts(10, PayloadKind::Object),
        ])
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(BenchError::Config("Region name must not be empty".to_string()));
        }

        if self.stages.is_empty() {
            return Err(BenchError::Config(
                "At least one stage must be configured".to_string(),
            ));
        }

        for (i, stage) in self.stages.iter().enumerate() {
            stage
                .validate()
                .map_err(|e| BenchError::Config(format!("Stage {}: {}", i + 1, e)))?;
        }

        match &self.key_prefix {
            Some(prefix) if prefix.is_empty() => {
                return Err(BenchError::Config("Key prefix must not be empty".to_string()));
            }
            None if self.key_prefix_len == 0 => {
                return Err(BenchError::Config(
                    "Key prefix length must be greater than 0".to_string(),
                ));
            }
            _ => {}
        }

        let size = self.string_payload_len()?;
        if size == 0 {
            return Err(BenchError::Config(
                "String payload size must be greater than 0".to_string(),
            ));
        }
        if size as u64 > MAX_STRING_PAYLOAD {
            return Err(BenchError::Config(format!(
                "String payload too large: {} bytes (max: {} bytes)",
                size, MAX_STRING_PAYLOAD
            )));
        }

        if let Some(timeout) = self.stage_timeout()? {
            if timeout.is_zero() {
                return Err(BenchError::Config(
                    "Stage timeout must be greater than 0".to_string(),
                ));
            }
        }

        self.latency_range()?;

        Ok(())
    }

    /// String payload size in bytes
    pub fn string_payload_len(&self) -> Result<usize> {
        let bytes = Byte::parse_str(&self.string_payload_size, true).map_err(|e| {
            BenchError::Config(format!(
                "Invalid string payload size '{}': {}",
                self.string_payload_size, e
            ))
        })?;
        Ok(bytes.as_u64() as usize)
    }

    /// Parsed stage timeout
    pub fn stage_timeout(&self) -> Result<Option<Duration>> {
        self.stage_timeout
            .as_deref()
            .map(|s| parse_duration_field("stage timeout", s))
            .transpose()
    }

    /// Parsed simulated latency range
    pub fn latency_range(&self) -> Result<Option<(Duration, Duration)>> {
        let Some(latency) = &self.latency else {
            return Ok(None);
        };
        let min = parse_duration_field("minimum latency", &latency.min)?;
        let max = parse_duration_field("maximum latency", &latency.max)?;
        if min > max {
            return Err(BenchError::Config(format!(
                "Minimum latency {} exceeds maximum latency {}",
                latency.min, latency.max
            )));
        }
        Ok(Some((min, max)))
    }

    /// Key sequence for a run
    pub fn key_generator(&self) -> KeyGenerator {
        match &self.key_prefix {
            Some(prefix) => KeyGenerator::new(prefix.clone()),
            None => KeyGenerator::random(self.key_prefix_len),
        }
    }

    /// Payloads for a run
    pub fn payload_provider(&self) -> Result<PayloadProvider> {
        let string_len = self.string_payload_len()?;
        match &self.object_payload {
            Some(path) => PayloadProvider::with_object_file(path, string_len),
            None => Ok(PayloadProvider::generate(string_len)),
        }
    }

    /// Replace the stage list
    pub fn with_stages(mut self, stages: Vec<StageSpec>) -> Self {
        self.stages = stages;
        self
    }

    /// Set a fixed key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set the string payload size, e.g. "1 KiB"
    pub fn with_string_payload_size(mut self, size: impl Into<String>) -> Self {
        self.string_payload_size = size.into();
        self
    }

    /// Set the per-stage timeout, e.g. "30s"
    pub fn with_stage_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.stage_timeout = Some(timeout.into());
        self
    }

    /// Enable or disable the smoke test
    pub fn with_smoke_test(mut self, enabled: bool) -> Self {
        self.smoke_test = enabled;
        self
    }

    /// Set the simulated latency range
    pub fn with_latency(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.latency = Some(LatencyConfig {
            min: min.into(),
            max: max.into(),
        });
        self
    }

    /// Load configuration from the standard config file location.
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load and validate configuration from `path`
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            BenchError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the standard config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Validate and write configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BenchError::Config(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(path, content).map_err(|e| {
            BenchError::Config(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/cachebench/cachebench.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            BenchError::Config("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

fn parse_duration_field(what: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| BenchError::Config(format!("Invalid {} '{}': {}", what, value, e)))
}
