//! Utility functions module
//!
//! Formatting helpers shared by the binary and the run summary.

pub mod units;

pub use units::{format_micros, format_rate, format_size};
