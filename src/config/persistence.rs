//! Results persistence module
//!
//! Keeps a rotating JSON history of completed runs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::RunReport;
use crate::{BenchError, Result, APP_NAME, MAX_RESULTS_HISTORY, RESULTS_FILE};

/// Results storage manager
#[derive(Debug)]
pub struct ResultsStorage {
    results_path: PathBuf,
}

/// Results file structure for JSON persistence
#[derive(Debug, Serialize, Deserialize)]
struct ResultsFile {
    version: u32,
    runs: Vec<RunReport>,
}

impl ResultsStorage {
    /// Create a storage manager at the standard location
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(Self::results_file_path()?))
    }

    /// Create a storage manager writing to `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: path.into(),
        }
    }

    /// Get the standard results file path
    /// Uses $DATA_HOME/cachebench/results.json
    pub fn results_file_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            BenchError::Persistence("Unable to determine data directory".to_string())
        })?;

        Ok(data_dir.join(APP_NAME).join(RESULTS_FILE))
    }

    /// Load every stored run, oldest first
    pub fn load_results(&self) -> Result<Vec<RunReport>> {
        if !self.results_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.results_path).map_err(|e| {
            BenchError::Persistence(format!(
                "Failed to read results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        let results_file: ResultsFile = serde_json::from_str(&content).map_err(|e| {
            BenchError::Persistence(format!(
                "Failed to parse results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        Ok(results_file.runs)
    }

    /// Append a run, keeping only the newest `MAX_RESULTS_HISTORY` entries
    pub fn append_result(&self, run: RunReport) -> Result<()> {
        let mut runs = self.load_results()?;
        runs.push(run);

        if runs.len() > MAX_RESULTS_HISTORY {
            let skip_count = runs.len() - MAX_RESULTS_HISTORY;
            runs.drain(..skip_count);
        }

        self.save_results(runs)
    }

    fn save_results(&self, runs: Vec<RunReport>) -> Result<()> {
        if let Some(parent) = self.results_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BenchError::Persistence(format!(
                    "Failed to create results directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let count = runs.len();
        let results_file = ResultsFile { version: 1, runs };
        let content = serde_json::to_string_pretty(&results_file)?;

        fs::write(&self.results_path, content).map_err(|e| {
            BenchError::Persistence(format!(
                "Failed to write results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        debug!(path = %self.results_path.display(), runs = count, "saved results history");
        Ok(())
    }

    /// Number of stored runs
    pub fn count_results(&self) -> Result<usize> {
        Ok(self.load_results()?.len())
    }

    /// Remove the results file
    pub fn clear_results(&self) -> Result<()> {
        if self.results_path.exists() {
            fs::remove_file(&self.results_path).map_err(|e| {
                BenchError::Persistence(format!(
                    "Failed to remove results file {}: {}",
                    self.results_path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// The most recent `count` runs, oldest first
    pub fn get_recent_results(&self, count: usize) -> Result<Vec<RunReport>> {
        let mut runs = self.load_results()?;
        let skip_count = runs.len().saturating_sub(count);
        runs.drain(..skip_count);
        Ok(runs)
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_run(prefix: &str) -> RunReport {
        RunReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            key_prefix: prefix.to_string(),
            stages: Vec::new(),
            error: None,
        }
    }

    fn storage_in(dir: &TempDir) -> ResultsStorage {
        ResultsStorage::with_path(dir.path().join("results.json"))
    }

    #[test]
    fn test_load_empty_results() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);
        assert!(storage.load_results().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_load_result() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);

        storage.append_result(create_test_run("first")).unwrap();

        let runs = storage.load_results().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].key_prefix, "first");
    }

    #[test]
    fn test_results_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);

        for i in 0..MAX_RESULTS_HISTORY + 10 {
            storage.append_result(create_test_run(&i.to_string())).unwrap();
        }

        let runs = storage.load_results().unwrap();
        assert_eq!(runs.len(), MAX_RESULTS_HISTORY);
        assert_eq!(runs[0].key_prefix, "10");
        assert_eq!(
            runs[runs.len() - 1].key_prefix,
            (MAX_RESULTS_HISTORY + 9).to_string()
        );
    }

    #[test]
    fn test_count_and_clear_results() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);
        assert_eq!(storage.count_results().unwrap(), 0);

        for i in 0..3 {
            storage.append_result(create_test_run(&i.to_string())).unwrap();
        }
        assert_eq!(storage.count_results().unwrap(), 3);

        storage.clear_results().unwrap();
        assert_eq!(storage.count_results().unwrap(), 0);
    }

    #[test]
    fn test_get_recent_results() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);

        for i in 0..10 {
            storage.append_result(create_test_run(&i.to_string())).unwrap();
        }

        let recent = storage.get_recent_results(5).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].key_prefix, "5");
        assert_eq!(recent[4].key_prefix, "9");

        assert_eq!(storage.get_recent_results(20).unwrap().len(), 10);
    }

    #[test]
    fn test_results_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);

        storage.append_result(create_test_run("fmt")).unwrap();

        let content = fs::read_to_string(storage.results_path()).unwrap();
        let results_file: ResultsFile = serde_json::from_str(&content).unwrap();
        assert_eq!(results_file.version, 1);
        assert_eq!(results_file.runs.len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir);
        fs::write(storage.results_path(), "{ not json").unwrap();

        assert!(matches!(
            storage.load_results(),
            Err(BenchError::Persistence(_))
        ));
    }
}
