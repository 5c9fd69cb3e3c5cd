//! Shared formatting helpers for report output.
//!
//! Pure string formatting only; everything that decides *what* to print
//! lives in `crash`, `regression` and `report`.

use chrono::NaiveDateTime;

/// Formats a timestamp as ISO-8601 with microsecond precision.
///
/// The log format carries no timezone, so neither does the output.
pub fn iso8601(time: &NaiveDateTime) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Converts a nanosecond value to whole milliseconds (truncating).
pub fn nsec_to_msec(nsec: f64) -> i64 {
    (nsec / 1_000_000.0) as i64
}

/// Formats a signed percentage ratio as `(+12.34%)` / `(-12.34%)`.
///
/// Zero and negative values carry no plus sign.
pub fn format_ratio(ratio: f64) -> String {
    let sign = if ratio > 0.0 { "+" } else { "" };
    format!("({}{:.2}%)", sign, ratio)
}

/// The `Before/After/Ratio` summary line shared by query and operation
/// report entries.
pub fn elapsed_summary(ratio: f64, old_nsec: f64, new_nsec: f64) -> String {
    format!(
        "Before(average): {} (msec) After(average): {} (msec) Ratio: {}",
        nsec_to_msec(old_nsec),
        nsec_to_msec(new_nsec),
        format_ratio(ratio)
    )
}
