//! Data models module
//!
//! Contains per-stage metrics, stage reports and whole-run reports.

pub mod result;

// Re-export commonly used types
pub use result::{MetricsReport, RunReport, StageReport};
