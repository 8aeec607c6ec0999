//! Shared value types and unit helpers.
//!
//! Everything in this workspace stores memory sizes as base-1024 bytes;
//! the conversions from the hypervisor's KiB figures happen at the
//! adapter boundary, not here.

mod memory_stat;
pub mod units;

pub use memory_stat::MemoryStat;

/// Formats a byte count as a short human-readable size.
///
/// Base-1024 with one decimal place; a trailing `.0` is dropped so round
/// values render as "16G" rather than "16.0G".
///
/// ```
/// use ballast_common::format_size;
///
/// assert_eq!(format_size(2_791_728_742), "2.6G");
/// assert_eq!(format_size(16 * 1024 * 1024 * 1024), "16G");
/// ```
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const SUFFIXES: [(u64, &str); 4] = [
        (units::TIB, "T"),
        (units::GIB, "G"),
        (units::MIB, "M"),
        (units::KIB, "K"),
    ];

    for (unit, suffix) in SUFFIXES {
        if bytes >= unit {
            let value = bytes as f64 / unit as f64;
            let rounded = (value * 10.0).round() / 10.0;
            return if rounded.fract() == 0.0 {
                format!("{}{}", rounded as u64, suffix)
            } else {
                format!("{rounded:.1}{suffix}")
            };
        }
    }

    format!("{bytes}B")
}

/// Formats a percentage with one decimal place ("4.1%").
#[must_use]
pub fn format_percent(percent: f64) -> String {
    format!("{percent:.1}%")
}
