//! Human-readable formatting for sizes, latencies and rates

use byte_unit::{Byte, UnitType};

/// Format a byte count with binary units
///
/// # Examples
/// ```
/// use cachebench::util::units::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(15 * 1024), "15.0 KiB");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let adjusted = Byte::from_u64(bytes).get_appropriate_unit(UnitType::Binary);
    format!("{:.1}", adjusted)
}

/// Format a microsecond count with appropriate precision
///
/// # Examples
/// ```
/// use cachebench::util::units::format_micros;
///
/// assert_eq!(format_micros(500), "500μs");
/// assert_eq!(format_micros(1_500), "1.50ms");
/// assert_eq!(format_micros(2_250_000), "2.25s");
/// ```
pub fn format_micros(micros: u64) -> String {
    if micros >= 1_000_000 {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    } else if micros >= 1_000 {
        format!("{:.2}ms", micros as f64 / 1_000.0)
    } else {
        format!("{}μs", micros)
    }
}

/// Format a puts-per-second rate
///
/// # Examples
/// ```
/// use cachebench::util::units::format_rate;
///
/// assert_eq!(format_rate(1500), "1.5K puts/sec");
/// assert_eq!(format_rate(2_500_000), "2.5M puts/sec");
/// ```
pub fn format_rate(ops_per_second: u64) -> String {
    let rate = ops_per_second as f64;
    if rate >= 1_000_000.0 {
        format!("{:.1}M puts/sec", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.1}K puts/sec", rate / 1_000.0)
    } else {
        format!("{} puts/sec", ops_per_second)
    }
}
